use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = getit::config::Config::from_env();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "getit",
        "GetIT starting: RUST_LOG='{}', http_port={}, public_dir='{}', data_dir='{}'",
        rust_log, config.http_port, config.public_dir.display(), config.data_dir.display()
    );

    getit::server::run_with_config(config).await
}
