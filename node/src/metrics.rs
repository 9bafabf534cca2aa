//! # Prometheus Metrics
//!
//! Exposes operational metrics for the gossip node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. Counters mirror
//! [`meshgossip_core::gossip::DiagnosticsSnapshot`] field-for-field; gauges add
//! the operational view the engine itself doesn't track (connection count,
//! peer table size).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use meshgossip_core::gossip::DiagnosticsSnapshot;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub heartbeats_received_total: IntCounter,
    pub heartbeats_relayed_total: IntCounter,
    pub duplicate_seq_total: IntCounter,
    pub invalid_pow_total: IntCounter,
    pub invalid_sig_total: IntCounter,
    pub new_peers_added_total: IntCounter,
    pub leave_messages_total: IntCounter,
    pub connected_peers: IntGauge,
    pub peer_table_size: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("meshgossip".into()), None)
            .expect("failed to create prometheus registry");

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::new($name, $help).expect("metric creation");
                registry.register(Box::new(c.clone())).expect("metric registration");
                c
            }};
        }
        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::new($name, $help).expect("metric creation");
                registry.register(Box::new(g.clone())).expect("metric registration");
                g
            }};
        }

        Self {
            heartbeats_received_total: counter!(
                "heartbeats_received_total",
                "Total number of HEARTBEAT messages accepted"
            ),
            heartbeats_relayed_total: counter!(
                "heartbeats_relayed_total",
                "Total number of HEARTBEAT messages relayed onward"
            ),
            duplicate_seq_total: counter!(
                "duplicate_seq_total",
                "Total number of HEARTBEATs dropped for a non-increasing sequence number"
            ),
            invalid_pow_total: counter!(
                "invalid_pow_total",
                "Total number of messages dropped for failing the proof-of-work check"
            ),
            invalid_sig_total: counter!(
                "invalid_sig_total",
                "Total number of messages dropped for failing signature verification"
            ),
            new_peers_added_total: counter!(
                "new_peers_added_total",
                "Total number of previously-unknown peers admitted to the peer table"
            ),
            leave_messages_total: counter!(
                "leave_messages_total",
                "Total number of verified LEAVE messages processed"
            ),
            connected_peers: gauge!(
                "connected_peers",
                "Number of currently open direct connections"
            ),
            peer_table_size: gauge!(
                "peer_table_size",
                "Number of peers currently known (excluding this node)"
            ),
            registry,
        }
    }

    /// Copies the latest values from the engine's [`DiagnosticsSnapshot`]
    /// and connection/peer counts into the Prometheus gauges/counters.
    ///
    /// `Diagnostics` counters are monotonic, same as `IntCounter`, but
    /// `prometheus::IntCounter` has no direct setter — so counters are
    /// reconciled by incrementing the observed delta since the last sync.
    pub fn sync_from(&self, snapshot: &DiagnosticsSnapshot, connected_peers: usize, peer_table_size: usize) {
        reconcile_counter(&self.heartbeats_received_total, snapshot.heartbeats_received);
        reconcile_counter(&self.heartbeats_relayed_total, snapshot.heartbeats_relayed);
        reconcile_counter(&self.duplicate_seq_total, snapshot.duplicate_seq);
        reconcile_counter(&self.invalid_pow_total, snapshot.invalid_pow);
        reconcile_counter(&self.invalid_sig_total, snapshot.invalid_sig);
        reconcile_counter(&self.new_peers_added_total, snapshot.new_peers_added);
        reconcile_counter(&self.leave_messages_total, snapshot.leave_messages);
        self.connected_peers.set(connected_peers as i64);
        self.peer_table_size.set(peer_table_size as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Brings a monotonic `IntCounter` up to `total` by incrementing the
/// observed delta. `total` is a cumulative count tracked by
/// [`meshgossip_core::gossip::Diagnostics`] since engine startup, so this
/// never needs to decrease.
fn reconcile_counter(counter: &IntCounter, total: u64) {
    let delta = total.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
