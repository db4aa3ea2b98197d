mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use syncwave_common::Config;
use syncwave_events::HttpEventPublisher;
use syncwave_gateway::{JsonHttpProviderClient, ProviderClient, ProviderGateway};
use syncwave_orchestrator::{FreshnessJob, Scheduler, SyncOrchestrator};
use syncwave_store::{ContentStore, PgStore};

use routes::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    tracing::info!("starting syncwave-server");

    let config = Config::from_env();
    config.log_summary();

    let store = Arc::new(
        PgStore::connect(&config.store.database_url, config.store.min_pool, config.store.max_pool)
            .await
            .context("connecting to store")?,
    );
    sqlx::migrate!("../../migrations").run(store.pool()).await.context("running migrations")?;

    let publisher = Arc::new(HttpEventPublisher::new(
        config.publisher.endpoint.clone(),
        config.publisher.send_timeout,
        config.publisher.cb_threshold,
        config.publisher.cb_open,
        config.publisher.spill_capacity,
    ));

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("building provider http client")?;

    let providers: Vec<(Arc<dyn ProviderClient>, syncwave_common::config::ProviderConfig)> = config
        .providers
        .iter()
        .map(|provider_config| {
            let client: Arc<dyn ProviderClient> = Arc::new(JsonHttpProviderClient::new(
                provider_config.name.clone(),
                provider_config.base_url.clone(),
                http_client.clone(),
            ));
            (client, provider_config.clone())
        })
        .collect();

    let store_dyn: Arc<dyn ContentStore> = store.clone();
    let gateway = Arc::new(ProviderGateway::new(providers));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        gateway,
        store_dyn.clone(),
        publisher.clone(),
        config.store.upsert_batch_size,
    ));
    let freshness = Arc::new(FreshnessJob::new(store_dyn.clone(), publisher));
    let scheduler = Arc::new(Scheduler::new(
        &config.scheduler.sync_cron,
        &config.scheduler.freshness_cron,
        orchestrator,
        freshness,
        store_dyn.clone(),
    )?);

    let cancellation = CancellationToken::new();

    let scheduler_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let cancellation = cancellation.clone();
        async move { scheduler.run(cancellation).await }
    });

    let app = build_router(AppState {
        store: store_dyn,
        scheduler,
    });

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("binding web listener")?;
    tracing::info!(%addr, "health surface listening");

    let web_cancellation = cancellation.clone();
    let web_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { web_cancellation.cancelled().await })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        result = scheduler_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "scheduler task panicked");
            }
        }
    }

    cancellation.cancel();
    match web_handle.await {
        Ok(Err(e)) => tracing::error!(error = %e, "web server exited with error"),
        Err(e) => tracing::error!(error = %e, "web server task panicked"),
        Ok(Ok(())) => {}
    }

    Ok(())
}
