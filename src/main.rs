use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use treesync_rs::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let level = if cli.global.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
