use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use ultra_router::config::AppConfig;
use ultra_router::metrics::{MetricsSink, PrometheusMetrics};
use ultra_router::router::overwrite::RouteOverwriteStore;
use ultra_router::router::RouterOrchestrator;
use ultra_router::state::{start_snapshot_ingest, PoolProvider};
use ultra_router::tokens::TokenMetadataProvider;
use ultra_router::venues::FileSnapshotProvider;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal router error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;

    let provider = Arc::new(FileSnapshotProvider::new(
        config.snapshot_path.clone(),
        config.pools.clone(),
    ));
    let tokens: Arc<dyn TokenMetadataProvider> = Arc::new(
        provider
            .token_metadata()
            .await
            .with_context(|| format!("read token list from {}", provider.path().display()))?,
    );

    let metrics = Arc::new(PrometheusMetrics::new().context("register router metrics")?);
    let sink: Arc<dyn MetricsSink> = metrics.clone();

    let overwrites = RouteOverwriteStore::new(Some(config.overwrite_routes_path.clone()));
    let mut router = RouterOrchestrator::new(config.router.clone(), overwrites, tokens, sink)
        .context("initialize router")?;
    if !config.route_overwrite_enabled {
        warn!("route overwrites disabled by configuration");
        router = router.without_route_overwrites();
    }
    let router = Arc::new(router);

    // overrides are validated against pools, so the first block must land first
    let block = provider
        .get_all_pools()
        .await
        .context("read initial pool snapshot")?;
    router.apply_block(block, &provider.cosmwasm_pool_config());
    let loaded = router
        .load_overwrite_routes()
        .context("load route overwrites")?;

    info!(
        height = router.state().height(),
        overwrites = loaded,
        snapshot = %provider.path().display(),
        "router online"
    );

    let app = App {
        config: Arc::new(config),
        router,
        metrics,
    };
    app.run(provider).await
}

struct App {
    config: Arc<AppConfig>,
    router: Arc<RouterOrchestrator>,
    metrics: Arc<PrometheusMetrics>,
}

impl App {
    async fn run(self, provider: Arc<FileSnapshotProvider>) -> Result<()> {
        let ingest = start_snapshot_ingest(provider, self.router.clone(), self.config.ingest_interval());
        let mut heights = self.router.state().subscribe();

        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let families = self.metrics.registry().gather();
                    info!(
                        height = self.router.state().height(),
                        candidate_searches = self.router.finder_invocations(),
                        metric_families = families.len(),
                        "router heartbeat"
                    );
                }
                height = heights.recv() => {
                    match height {
                        Ok(height) => debug!(height = height, "pool generation swapped"),
                        Err(err) => debug!(error = %err, "generation subscriber lagged"),
                    }
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, exiting");
                    break;
                }
            }
        }
        ingest.abort();

        if let Some(dir) = &self.config.state_dump_dir {
            self.router
                .store_router_state_files(dir)
                .with_context(|| format!("dump router state to {}", dir.display()))?;
        }
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
