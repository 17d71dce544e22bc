use timereporter::commands::Cli;
use timereporter::libs::daemon;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "timereporter=info".into()))
        .with_writer(std::io::stderr)
        .init();

    // Hidden entry point of `watch --background`.
    if std::env::args().any(|arg| arg == "--daemon-run") {
        return daemon::run_with_signal_handling().await;
    }

    Cli::menu().await
}
