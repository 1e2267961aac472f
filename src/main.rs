use axum::{
    Router,
    extract::Extension,
    routing::get,
};
use distributed_filestore::catalog::client::HttpCatalogClient;
use distributed_filestore::config::Config;
use distributed_filestore::consistency::engine::ConsistencyEngine;
use distributed_filestore::fleet::controller::FleetController;
use distributed_filestore::fleet::handlers::{
    ResponderRouter, WorkerRouter, handle_next_coordinator, handle_next_worker, handle_status,
};
use distributed_filestore::fleet::provider::{ShellInventory, ShellProvisioner};
use distributed_filestore::fleet::types::{FleetView, NodeRole};
use distributed_filestore::health::monitor::InstanceMonitor;
use distributed_filestore::router::tracker::NodeTracker;
use distributed_filestore::storage::client::HttpStorageClient;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::from_args(&args)?;

    tracing::info!("Starting control plane as {}", config.identity);

    // 1. Fleet controller:
    let view = FleetView::new();
    let inventory = ShellInventory::new(&config.fleet_command);
    let provisioning = ShellProvisioner::new(&config.fleet_command);

    let controller = FleetController::new(
        config.identity.clone(),
        config.targets,
        config.activation_deadline,
        inventory,
        provisioning.clone(),
        view.clone(),
    );

    // 2. Health monitor:
    let monitor = InstanceMonitor::new(
        view.clone(),
        provisioning,
        config.probe_interval,
        config.probe_staleness,
        config.activation_deadline,
    );

    // 3. Consistency engine:
    let storage = Arc::new(HttpStorageClient::new());
    let catalog = Arc::new(HttpCatalogClient::new(&config.catalog_addr));
    let engine = ConsistencyEngine::new(storage, catalog);

    // 4. Request trackers:
    let worker_tracker = NodeTracker::new(view.clone(), NodeRole::Worker, config.activation_deadline);
    let responder_tracker =
        NodeTracker::new(view.clone(), NodeRole::Coordinator, config.activation_deadline);

    // 5. HTTP Router:
    let app = Router::new()
        .route("/status", get(handle_status))
        .route("/worker/next", get(handle_next_worker))
        .route("/coordinator/next", get(handle_next_coordinator))
        .layer(Extension(view.clone()))
        .layer(Extension(Arc::new(config.identity.clone())))
        .layer(Extension(WorkerRouter(worker_tracker)))
        .layer(Extension(ResponderRouter(responder_tracker)));

    // 6. Spawn reconcile loop:
    let fleet_tick = config.fleet_tick;
    tokio::spawn(async move {
        controller.run(fleet_tick).await;
    });

    // 7. Spawn probe scan loop:
    let probe_scan_tick = config.probe_scan_tick;
    tokio::spawn(async move {
        monitor.run(probe_scan_tick).await;
    });

    // 8. Spawn consistency loop, gated on coordinator duty each tick:
    let engine_view = view.clone();
    let activation_deadline = config.activation_deadline;
    let consistency_tick = config.consistency_tick;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(consistency_tick);

        loop {
            interval.tick().await;
            let snapshot = engine_view.load().await;
            if !snapshot.is_coordinator {
                continue;
            }

            let nodes: Vec<String> = snapshot
                .healthy_serving(NodeRole::Storage, activation_deadline.as_secs())
                .into_iter()
                .map(|n| n.internal_addr)
                .collect();

            if let Err(e) = engine.run_cycle(&nodes).await {
                tracing::error!("Consistency cycle failed: {}", e);
            }
        }
    });

    // 9. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
