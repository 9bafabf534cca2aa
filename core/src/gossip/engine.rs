//! # Gossip Engine
//!
//! The owning value that ties every other component together (§4.6, §9):
//! identity, sequence counter, Peer Table, Relay Dedup Filter, Rate
//! Limiter, Diagnostics, Event Bus, and Connection Manager. There is
//! exactly one `Engine` per process, driven from a single task — the
//! "engine loop" — that is the sole writer to all of the above (§5).
//!
//! Two things happen on a timer (`tick`): the local heartbeat is re-signed
//! and broadcast, and stale peers are swept out of the table. Everything
//! else happens in response to inbound messages via
//! [`handle_message`](Engine::handle_message) in the sibling `handler`
//! module.

use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::{LIVENESS_TTL, MAX_RELAY_HOPS, SHUTDOWN_GRACE};
use crate::identity::NodeIdentity;

use super::connection::{ConnId, ConnectionManager, InboundEvent, OverlaySocket};
use super::dedup::RelayDedupFilter;
use super::diagnostics::Diagnostics;
use super::event_bus::{EventBus, EventPayload, PeerView};
use super::peer_table::PeerTable;
use super::rate_limiter::RateLimiter;
use super::wire::WireMessage;

/// The whole engine: identity plus every piece of shared mutable state a
/// single writer is responsible for. Constructed once at startup and then
/// driven exclusively from the engine-loop task.
pub struct Engine {
    pub(crate) identity: NodeIdentity,
    pub(crate) seq: u64,
    pub(crate) peer_table: PeerTable,
    pub(crate) dedup: RelayDedupFilter,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) event_bus: EventBus,
    pub(crate) connections: ConnectionManager,
}

impl Engine {
    pub fn new(identity: NodeIdentity, now: Instant) -> Self {
        let mut peer_table = PeerTable::new();
        peer_table.set_local_id(identity.id());
        peer_table.update_self(0, now);

        Self {
            identity,
            seq: 0,
            peer_table,
            dedup: RelayDedupFilter::new(),
            rate_limiter: RateLimiter::new(),
            diagnostics: Diagnostics::new(),
            event_bus: EventBus::new(),
            connections: ConnectionManager::default(),
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn diagnostics_snapshot(&self) -> super::diagnostics::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn peer_count(&self) -> usize {
        self.peer_table.size().saturating_sub(1)
    }

    /// Register a freshly accepted socket with the Connection Manager.
    pub fn accept<S: OverlaySocket>(&mut self, socket: S, inbound: mpsc::UnboundedSender<InboundEvent>) -> ConnId {
        self.connections.accept(socket, inbound)
    }

    /// Finish admitting a freshly accepted socket (§4.7 steps 2–3): send it
    /// an unsolicited hello heartbeat so the new peer doesn't wait out a
    /// full `HEARTBEAT_INTERVAL` for its first signal from us, and publish
    /// a membership change since the direct-connection count just grew.
    pub fn handle_accepted(&mut self, conn_id: ConnId) {
        let hello = self.signed_heartbeat();
        self.connections.send(conn_id, &hello);
        self.emit_membership_change();
    }

    /// Drop a closed/errored connection's handle (§4.7). Per the §9 design
    /// note, this does NOT evict the peer from the Peer Table — a peer
    /// reachable via relayed heartbeats survives the loss of one direct
    /// path and is only swept by [`tick`](Engine::tick) after
    /// `LIVENESS_TTL` of silence.
    pub fn handle_closed(&mut self, conn_id: ConnId) {
        self.connections.remove(conn_id);
    }

    /// Number of currently open direct connections.
    pub fn direct_connection_count(&self) -> usize {
        self.connections.connection_count()
    }

    fn signed_heartbeat(&self) -> WireMessage {
        let message = format!("seq:{}", self.seq);
        let sig = self.identity.sign(message.as_bytes());
        WireMessage::Heartbeat {
            id: hex::encode(self.identity.id()),
            seq: self.seq,
            hops: 0,
            nonce: self.identity.nonce(),
            sig: sig.to_hex(),
        }
    }

    fn signed_leave(&self) -> WireMessage {
        let id_hex = hex::encode(self.identity.id());
        let message = format!("type:LEAVE:{id_hex}");
        let sig = self.identity.sign(message.as_bytes());
        WireMessage::Leave {
            id: id_hex,
            hops: 0,
            sig: sig.to_hex(),
        }
    }

    /// One periodic tick of the Gossip Engine (§4.6): advance and
    /// broadcast the local heartbeat, rotate the dedup filter, garbage
    /// collect the rate limiter, and evict stale peers.
    pub fn tick(&mut self, now: Instant) {
        self.seq += 1;
        self.peer_table.update_self(self.seq, now);

        let heartbeat = self.signed_heartbeat();
        self.connections.broadcast_except(None, &heartbeat);

        self.dedup.maybe_rotate(now);
        self.rate_limiter.gc_stale(now);

        let evicted = self.peer_table.sweep_stale(now, LIVENESS_TTL);
        if !evicted.is_empty() {
            self.emit_membership_change();
        }
    }

    /// Broadcast a signed LEAVE and allow `SHUTDOWN_GRACE` for it to reach
    /// directly connected peers before the process exits (§4.6).
    pub async fn shutdown(&mut self) {
        let leave = self.signed_leave();
        self.connections.broadcast_except(None, &leave);
        info!("broadcast LEAVE, waiting out shutdown grace period");
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }

    /// Publish the current membership view to the Event Bus. Called
    /// whenever admission, eviction, or a LEAVE changes who is known.
    pub(crate) fn emit_membership_change(&self) {
        let local_id = self.identity.id();
        let peers: Vec<PeerView> = self
            .peer_table
            .snapshot()
            .into_iter()
            .filter(|p| p.id != local_id)
            .map(|p| PeerView {
                id: hex::encode(p.id),
                ip: p.direct_ip.map(|ip: IpAddr| ip.to_string()),
                lat: None,
                lng: None,
            })
            .collect();

        let count = peers.len();
        let direct = self.connections.direct_connection_ids().len();

        self.event_bus.publish(EventPayload::Membership {
            count,
            direct,
            total_unique: count,
            id: hex::encode(local_id),
            screenname: None,
            peers,
            diagnostics: self.diagnostics.snapshot(),
        });
    }

    /// Called from a connection's read task on a fully decoded message.
    /// Thin wrapper so callers outside this module don't need to know
    /// `MAX_RELAY_HOPS` lives here; kept for symmetry with `handle_message`.
    pub fn max_relay_hops() -> u8 {
        MAX_RELAY_HOPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> NodeIdentity {
        NodeIdentity::generate()
    }

    #[test]
    fn new_engine_starts_with_only_its_own_record() {
        let engine = Engine::new(identity(), Instant::now());
        assert_eq!(engine.peer_count(), 0);
    }

    #[test]
    fn tick_advances_local_sequence() {
        let mut engine = Engine::new(identity(), Instant::now());
        let now = Instant::now();
        engine.tick(now);
        assert_eq!(engine.seq, 1);
        engine.tick(now);
        assert_eq!(engine.seq, 2);
    }

    #[test]
    fn tick_sweeps_stale_peers_and_emits_membership_change() {
        let mut engine = Engine::new(identity(), Instant::now());
        let mut rx = engine.event_bus.subscribe();

        let base = Instant::now();
        let stranger = [7u8; 32];
        engine.peer_table.add_or_update(stranger, 1, base, None);
        assert_eq!(engine.peer_count(), 1);

        let later = base + LIVENESS_TTL + std::time::Duration::from_millis(1);
        engine.tick(later);

        assert_eq!(engine.peer_count(), 0);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_out_the_grace_period() {
        let mut engine = Engine::new(identity(), Instant::now());
        let start = tokio::time::Instant::now();
        engine.shutdown().await;
        assert!(tokio::time::Instant::now() - start >= SHUTDOWN_GRACE);
    }

    #[test]
    fn handle_accepted_emits_membership_change_without_peer_table_growth() {
        let mut engine = Engine::new(identity(), Instant::now());
        let mut rx = engine.event_bus.subscribe();

        // No live socket is registered for this id, so the hello send is a
        // harmless no-op; the membership publish is what's under test.
        engine.handle_accepted(0);

        assert_eq!(engine.peer_count(), 0, "accepting a connection alone does not admit a peer");
        assert!(rx.try_recv().is_ok(), "membership change must be published on accept");
    }
}
