use ag_shared::config::AppConfig;
use anyhow::anyhow;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    config.validate().map_err(|err| anyhow!("invalid configuration: {err}"))?;

    ag_api::telemetry::init(&config.logging)?;
    info!(
        environment = ?config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting authgate"
    );

    ag_api::run(config).await
}
