use std::sync::Arc;
use triserve::config::{Config, Mode};
use triserve::server::blocking::BlockingServer;
use triserve::server::pool::{CachedPool, FixedPool, SpawnPool, WorkerPool};
use triserve::server::reactive::ReactiveServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    tracing::info!("Starting {:?} server on {}", cfg.mode, cfg.addr());

    if cfg.mode == Mode::Reactive {
        let mut server = ReactiveServer::start(&cfg)?;
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");
        server.stop();
        return Ok(());
    }

    let pool: Arc<dyn WorkerPool> = match cfg.mode {
        Mode::Fixed => Arc::new(FixedPool::new(cfg.workers, cfg.queue_depth)),
        Mode::Cached => Arc::new(CachedPool::new()),
        _ => Arc::new(SpawnPool::new()),
    };

    let mut server = BlockingServer::start(&cfg, pool)?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.stop();

    Ok(())
}
