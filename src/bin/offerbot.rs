use anyhow::{Context, Result};
use offerbot::config::BotConfig;
use offerbot::runtime::BotRuntime;
use offerbot::server::serve;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,offerbot=debug")),
        )
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    let server_rt = tokio::runtime::Runtime::new().context("failed to start server runtime")?;
    server_rt.block_on(async {
        let runtime = BotRuntime::bootstrap(config)
            .await
            .context("failed to bootstrap offer bot")?;
        serve(runtime).await
    })
}
