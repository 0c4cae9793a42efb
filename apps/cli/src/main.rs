mod args;
mod config;
mod dirs;

use std::io;
use std::net::SocketAddr;

use http_api::HttpState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use usage_app::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    let loaded = config::load_or_create(args.config.as_deref()).map_err(io::Error::other)?;
    if loaded.created {
        println!(
            "Created config at {} (default port {}).",
            loaded.file.display(),
            loaded.config.port
        );
    }
    let mut cli_config = loaded.config;
    cli_config.apply_env_overrides(|key| std::env::var(key).ok());

    let db_path = match cli_config.db_path.clone() {
        Some(path) => path,
        None => dirs::default_db_path().map_err(io::Error::other)?,
    };
    println!("Using database: {}", db_path.display());

    let app_state = AppState::open(AppConfig {
        db_path,
        telemetry: cli_config.telemetry.clone(),
    })
    .map_err(|err| io::Error::other(format!("failed to initialize database: {err}")))?;

    if args.import_only {
        let run = app_state
            .services
            .import
            .run()
            .await
            .map_err(|err| io::Error::other(err.to_string()))?;
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    if args.import_on_start {
        if app_state.services.import.is_configured() {
            let import = app_state.services.import.clone();
            tokio::spawn(async move {
                match import.run().await {
                    Ok(run) => info!(
                        run_id = run.id,
                        status = run.status.as_str(),
                        "startup import finished"
                    ),
                    Err(err) => error!(error = %err, "startup import failed"),
                }
            });
        } else {
            warn!("telemetry credentials not configured; skipping startup import");
        }
    }

    let router = http_api::router(HttpState::new(app_state));

    let port = args.port.unwrap_or(cli_config.port);
    let (listener, actual_port, used_fallback) = bind_port(port).await?;
    let url = format!("http://127.0.0.1:{actual_port}");

    if used_fallback {
        eprintln!("Configured port {port} was unavailable; using {actual_port} for this run.");
    }

    println!("Usage Tracker is running at {url}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn bind_port(port: u16) -> Result<(tokio::net::TcpListener, u16, bool), io::Error> {
    if port == 0 {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let actual_port = listener.local_addr()?.port();
        return Ok((listener, actual_port, false));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => Ok((listener, port, false)),
        Err(_) => {
            let listener =
                tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
            let actual_port = listener.local_addr()?.port();
            Ok((listener, actual_port, true))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
