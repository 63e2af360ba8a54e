#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::SocketAddr;
use watchsync_server::config;
use watchsync_server::logging;
use watchsync_server::server::SyncServer;
use watchsync_server::websocket;

/// Watchsync -- lightweight coordination server for synchronized group playback
#[derive(Parser, Debug)]
#[command(name = "watchsync-server")]
#[command(about = "A lightweight, in-memory server for watching videos together in lock-step")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = config::load();

    // Handle --print-config: output the loaded configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() already validates but only logs problems to stderr and
    // continues. Capture the result here to provide a proper exit code for
    // --validate-config mode and to fail startup on a broken config.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Uploads directory: {}", cfg.media.uploads_dir);
                println!("  Max upload size: {} bytes", cfg.media.max_upload_size);
                println!("  Chat history cap: {}", cfg.server.chat_history_cap);
                println!("  Room code length: {}", cfg.protocol.room_code_length);
                println!("  CORS origins: {}", cfg.server.cors_origins);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors
    validation_result.map_err(|e| anyhow::anyhow!("invalid configuration:\n{e}"))?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let cors_origins = cfg.server.cors_origins.clone();

    tracing::info!(%addr, "Starting watchsync server");

    let server = SyncServer::new(cfg).await?;

    let app = websocket::create_router(&cors_origins).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cors_origins,
        "Server started - WebSocket protocol: /ws, media API: /api"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
