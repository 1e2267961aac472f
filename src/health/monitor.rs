use crate::fleet::provider::ProvisioningProvider;
use crate::fleet::types::{ComputeNode, FleetView, NodeRole};
use crate::storage::protocol::ENDPOINT_PING;

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const PROBE_TIMEOUT_MS: u64 = 2_000;

/// A persistent probe against one instance.
///
/// The spawned loop pings the instance on a fixed interval and records the
/// last successful response time; the scan pass reads that to decide whether
/// the instance went silent.
pub(crate) struct ProbeSession {
    pub(crate) node: ComputeNode,
    pub(crate) last_ok: Arc<AtomicU64>,
    handle: tokio::task::JoinHandle<()>,
}

impl ProbeSession {
    /// Same instance, not merely the same id. A replacement that reuses the
    /// id shows up with different addresses and must get a fresh session.
    fn matches(&self, node: &ComputeNode) -> bool {
        self.node.id == node.id
            && self.node.internal_addr == node.internal_addr
            && self.node.public_addr == node.public_addr
    }
}

impl Drop for ProbeSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum Action {
    Open,
    Reopen,
    Escalate,
    Keep,
}

/// Watches worker and storage instances with persistent probe sessions and
/// deletes the ones that stop answering, so the fleet controller replaces
/// them on its next pass.
pub struct InstanceMonitor<P> {
    view: FleetView,
    provisioning: Arc<P>,
    sessions: DashMap<String, ProbeSession>,
    http_client: reqwest::Client,
    probe_interval: Duration,
    staleness_window: Duration,
    activation_deadline: Duration,
}

impl<P> InstanceMonitor<P>
where
    P: ProvisioningProvider + 'static,
{
    pub fn new(
        view: FleetView,
        provisioning: Arc<P>,
        probe_interval: Duration,
        staleness_window: Duration,
        activation_deadline: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            view,
            provisioning,
            sessions: DashMap::new(),
            http_client: reqwest::Client::new(),
            probe_interval,
            staleness_window,
            activation_deadline,
        })
    }

    pub async fn run(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;
            self.scan().await;
        }
    }

    /// One scan pass: reconcile the session registry against the fleet and
    /// escalate sessions that have gone silent.
    pub async fn scan(&self) {
        let snapshot = self.view.load().await;

        // Only the active coordinator holds probe sessions; losing that duty
        // means dropping them so two monitors never escalate the same node.
        if !snapshot.is_coordinator {
            if !self.sessions.is_empty() {
                tracing::info!("Not the active coordinator, closing probe sessions");
                self.sessions.clear();
            }
            return;
        }

        let deadline_secs = self.activation_deadline.as_secs();
        let mut watched: Vec<ComputeNode> =
            snapshot.healthy_serving(NodeRole::Worker, deadline_secs);
        watched.extend(snapshot.healthy_serving(NodeRole::Storage, deadline_secs));

        // Sessions for instances that left the fleet.
        let watched_ids: Vec<&str> = watched.iter().map(|n| n.id.as_str()).collect();
        self.sessions
            .retain(|id, _| watched_ids.contains(&id.as_str()));

        for node in watched {
            let action = match self.sessions.get(&node.id) {
                None => Action::Open,
                Some(session) if !session.matches(&node) => Action::Reopen,
                Some(session) => {
                    let last_ok = session.last_ok.load(Ordering::Relaxed);
                    if now_ms().saturating_sub(last_ok) > self.staleness_window.as_millis() as u64 {
                        Action::Escalate
                    } else {
                        Action::Keep
                    }
                }
            };

            match action {
                Action::Open => self.open_session(node),
                Action::Reopen => {
                    tracing::info!("Instance {} was replaced, reopening probe", node.id);
                    self.sessions.remove(&node.id);
                    self.open_session(node);
                }
                Action::Escalate => {
                    tracing::warn!("Instance {} went silent, deleting it", node.id);
                    self.sessions.remove(&node.id);
                    if let Err(e) = self.provisioning.delete_node(&node.id).await {
                        tracing::error!("Failed to delete silent instance {}: {}", node.id, e);
                    }
                }
                Action::Keep => {}
            }
        }
    }

    fn open_session(&self, node: ComputeNode) {
        tracing::debug!("Opening probe session for {}", node.id);

        // A fresh session starts with a full staleness budget.
        let last_ok = Arc::new(AtomicU64::new(now_ms()));
        let url = probe_url(&node);
        let client = self.http_client.clone();
        let probe_interval = self.probe_interval;
        let probe_last_ok = last_ok.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(probe_interval);

            loop {
                interval.tick().await;
                let response = client
                    .get(url.clone())
                    .timeout(Duration::from_millis(PROBE_TIMEOUT_MS))
                    .send()
                    .await;

                match response {
                    Ok(resp) if resp.status().is_success() => {
                        probe_last_ok.store(now_ms(), Ordering::Relaxed);
                    }
                    Ok(resp) => {
                        tracing::debug!("Probe {} answered {}", url, resp.status());
                    }
                    Err(e) => {
                        tracing::debug!("Probe {} failed: {}", url, e);
                    }
                }
            }
        });

        self.sessions.insert(
            node.id.clone(),
            ProbeSession {
                node,
                last_ok,
                handle,
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub(crate) fn session_last_ok(&self, id: &str) -> Option<Arc<AtomicU64>> {
        self.sessions.get(id).map(|s| s.last_ok.clone())
    }

    #[cfg(test)]
    pub(crate) fn session_addr(&self, id: &str) -> Option<String> {
        self.sessions.get(id).map(|s| s.node.internal_addr.clone())
    }
}

fn probe_url(node: &ComputeNode) -> String {
    match node.role {
        NodeRole::Storage => format!("http://{}{}", node.internal_addr, ENDPOINT_PING),
        _ => format!("http://{}/health", node.internal_addr),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
