use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;

use datar_client::api::{Backend, HttpBackend};
use datar_client::app::App;
use datar_client::cli::Repl;
use datar_client::cli::repl::stdin_lines;
use datar_client::config::ClientConfig;
use datar_client::error::Result;

/// Log to a daily file when a log directory is configured, so the REPL's
/// stdout stays readable. Otherwise log to stderr.
fn init_tracing(config: &ClientConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "datar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

/// Read the environment and build the backend client.
fn connect() -> Result<(ClientConfig, HttpBackend)> {
    let config = ClientConfig::from_env()?;
    let backend = HttpBackend::from_config(&config)?;
    Ok((config, backend))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, backend) = connect().context("Failed to start the DATAR client")?;
    let _log_guard = init_tracing(&config);

    eprintln!("🌿 DATAR v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", backend.base_url());
    match backend.health().await {
        Ok(status) => eprintln!(
            "   Estado: {} ({} agentes disponibles)",
            status.status, status.agents_available
        ),
        Err(e) => eprintln!("   Estado: no disponible ({e})"),
    }
    eprintln!("   Escribe /help para ver los comandos. /quit para salir.\n");

    let app = App::new(Arc::new(backend));
    let mut repl = Repl::new(app, std::io::stdout());
    let summary = repl.load().await;
    tracing::info!(
        agents = ?summary.agents,
        experiences = ?summary.experiences,
        "Catalog loaded"
    );

    repl.run(stdin_lines()).await?;

    Ok(())
}
