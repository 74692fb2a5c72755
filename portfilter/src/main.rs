use anyhow::Context;
use clap::Parser;
use portfilter::{ConfigLoader, ControlServer, ControlServerConfig, Engine, ShowMode};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "portfilterd")]
#[command(about = "Port-based packet filter with operator control socket")]
struct Args {
    /// Unix domain socket path for add/show/del commands (overrides config)
    #[arg(long, short = 's')]
    socket: Option<PathBuf>,

    /// Config file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Show endpoint behaviour: toggle | always (overrides config)
    #[arg(long)]
    show_mode: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let env_filter = if args.verbose {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = ConfigLoader::load_or_default(args.config).context("loading config")?;

    if let Some(socket) = args.socket {
        config.control.socket_path = socket;
    }
    if let Some(mode) = args.show_mode.as_deref() {
        config.control.show_mode = ShowMode::parse(mode)?;
    }

    let engine = Engine::from_config(&config);
    tracing::info!(
        capacity = engine.table().capacity(),
        proxy = %config.engine.proxy_addr,
        show_mode = %config.control.show_mode,
        "Filter engine ready"
    );

    let server = ControlServer::new(ControlServerConfig {
        socket_path: config.control.socket_path.clone(),
        protocol: engine.protocol().clone(),
    });

    tokio::select! {
        result = server.start() => {
            result.with_context(|| format!("serving {:?}", config.control.socket_path))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down, {} rule(s) discarded", engine.table().size());
        }
    }

    let _ = std::fs::remove_file(&config.control.socket_path);
    Ok(())
}
