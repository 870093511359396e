use clap::Parser;
use tracing::info;

use enroute_sc::cli::ScOpt;
use enroute_sc::platform::MemoryPlatform;
use enroute_sc::start_main_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = ScOpt::parse();
    let config = opt.as_config();

    info!(namespace = %config.namespace, "enroute space controller starting in local mode");

    // local mode runs against the in-memory platform; a real orchestration
    // client plugs in through the same PlatformClient trait
    let client = MemoryPlatform::new_shared();
    let (_ctx, controller) = start_main_loop(config, client);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    controller.shutdown().await;

    Ok(())
}
