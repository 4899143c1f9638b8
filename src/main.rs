use clap::Parser;
use nim_proxy::config::config_search_paths;
use nim_proxy::{build_router, AppState, ProxyConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "nim-proxy",
    about = "OpenAI-compatible proxy for the NVIDIA NIM chat completions API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and $PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nim_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        println!("  (built-in defaults when none exists)");
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.upstream.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    let client = builder.build()?;

    let state = Arc::new(AppState::new(config.clone(), client));

    info!("nim-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {} ({})", config.upstream.name, config.upstream.base_url);
    info!("  Port:      {}", config.port);
    info!(
        "  Models:    {} mapped, default {}",
        state.mapping.len(),
        state.mapping.default_model()
    );
    match config.response.paragraph_cap {
        Some(max) => info!("  Paragraphs: capped at {}", max),
        None => info!("  Paragraphs: uncapped"),
    }
    info!(
        "  Search:    {}",
        if state.search.is_some() { "enabled" } else { "disabled" }
    );
    if state.api_key.is_some() {
        info!("  API key:   configured");
    } else {
        warn!(
            "  API key:   MISSING (set {}); chat completions will fail",
            config.upstream.api_key_env
        );
    }

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
