use super::types::{ComputeNode, FleetView};
use crate::router::tracker::NodeTracker;

use axum::Json;
use axum::extract::Extension;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Worker-facing tracker handle, distinguishable as an axum extension.
#[derive(Clone)]
pub struct WorkerRouter(pub Arc<NodeTracker>);

/// Responder-facing tracker handle.
#[derive(Clone)]
pub struct ResponderRouter(pub Arc<NodeTracker>);

#[derive(Debug, Serialize, Deserialize)]
pub struct FleetStatus {
    pub identity: String,
    pub is_responder: bool,
    pub is_coordinator: bool,
    pub coordinators: Vec<ComputeNode>,
    pub workers: Vec<ComputeNode>,
    pub storage: Vec<ComputeNode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextNodeResponse {
    pub node_id: Option<String>,
    pub internal_addr: Option<String>,
}

pub async fn handle_status(
    Extension(view): Extension<FleetView>,
    Extension(identity): Extension<Arc<String>>,
) -> (StatusCode, Json<FleetStatus>) {
    let snapshot = view.load().await;

    let status = FleetStatus {
        identity: identity.as_ref().clone(),
        is_responder: snapshot.is_responder,
        is_coordinator: snapshot.is_coordinator,
        coordinators: snapshot.coordinators.clone(),
        workers: snapshot.workers.clone(),
        storage: snapshot.storage.clone(),
    };

    (StatusCode::OK, Json(status))
}

pub async fn handle_next_worker(
    Extension(router): Extension<WorkerRouter>,
) -> (StatusCode, Json<NextNodeResponse>) {
    next_response(router.0.next().await)
}

pub async fn handle_next_coordinator(
    Extension(router): Extension<ResponderRouter>,
) -> (StatusCode, Json<NextNodeResponse>) {
    next_response(router.0.next().await)
}

fn next_response(node: Option<ComputeNode>) -> (StatusCode, Json<NextNodeResponse>) {
    match node {
        Some(node) => (
            StatusCode::OK,
            Json(NextNodeResponse {
                node_id: Some(node.id),
                internal_addr: Some(node.internal_addr),
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(NextNodeResponse {
                node_id: None,
                internal_addr: None,
            }),
        ),
    }
}
