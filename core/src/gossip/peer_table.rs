//! # Peer Table
//!
//! The authoritative membership view: a mapping from node identifier to
//! [`PeerRecord`], with a hard cap on live entries and the `addOrUpdate`
//! choke-point that is the only place a new identity gets admitted (§4.3).
//!
//! Reads and writes here are expected to happen from a single logical
//! writer (the engine loop, §5) — this type itself is a plain owned
//! structure with no internal locking; the engine wraps it as needed.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use crate::config::MAX_PEERS;

/// One entry for a known, live peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Node identifier (public key bytes), duplicated here for convenient
    /// iteration over snapshots without a second lookup.
    pub id: [u8; 32],
    /// Last accepted, monotonically increasing sequence number from this peer.
    pub seq: u64,
    /// Wall-clock-ish time of the last accepted heartbeat. Uses a
    /// monotonic [`Instant`] rather than system time so TTL comparisons
    /// are immune to clock adjustments.
    pub last_seen: Instant,
    /// IP observed on a 0-hop delivery. Only ever set from a direct
    /// (hops == 0) message; cleared on eviction.
    pub direct_ip: Option<IpAddr>,
}

/// The membership view. `id` uniquely keys the table; `seq` is monotone
/// non-decreasing per `id`; `last_seen` advances only on acceptance; the
/// local node's own record is always present and exempt from the
/// staleness sweep.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<[u8; 32], PeerRecord>,
    local_id: Option<[u8; 32]>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            local_id: None,
        }
    }

    /// Mark `id` as the local node's own identifier. Its record is exempt
    /// from `sweepStale`.
    pub fn set_local_id(&mut self, id: [u8; 32]) {
        self.local_id = Some(id);
    }

    pub fn get(&self, id: &[u8; 32]) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    /// Insert or update the record for `id`. Rejects with no effect if a
    /// record already exists and `seq <= stored.seq` (duplicate or
    /// regression). If `id` is not yet present, admits it only if the
    /// table has room (`size() < MAX_PEERS`). Returns whether this call
    /// admitted a previously-unknown identity — the Message Handler uses
    /// this to decide whether to emit a membership-change event.
    pub fn add_or_update(&mut self, id: [u8; 32], seq: u64, now: Instant, direct_ip: Option<IpAddr>) -> bool {
        if let Some(existing) = self.peers.get(&id) {
            if seq <= existing.seq {
                return false;
            }
            let record = self.peers.get_mut(&id).expect("just checked presence");
            record.seq = seq;
            record.last_seen = now;
            if let Some(ip) = direct_ip {
                record.direct_ip = Some(ip);
            }
            return false;
        }

        if self.peers.len() >= MAX_PEERS {
            return false;
        }

        self.peers.insert(
            id,
            PeerRecord {
                id,
                seq,
                last_seen: now,
                direct_ip,
            },
        );
        true
    }

    /// Update the local node's own record, bypassing the cap/regression
    /// checks that apply to remote peers — the Gossip Engine calls this
    /// once per heartbeat tick.
    pub fn update_self(&mut self, seq: u64, now: Instant) {
        let id = self.local_id.expect("set_local_id must be called before update_self");
        self.peers.insert(
            id,
            PeerRecord {
                id,
                seq,
                last_seen: now,
                direct_ip: None,
            },
        );
    }

    pub fn remove(&mut self, id: &[u8; 32]) -> Option<PeerRecord> {
        self.peers.remove(id)
    }

    /// Remove every record with `now - last_seen > LIVENESS_TTL`, except
    /// the local node's own record. Returns the ids evicted.
    pub fn sweep_stale(&mut self, now: Instant, liveness_ttl: std::time::Duration) -> Vec<[u8; 32]> {
        let local_id = self.local_id;
        let stale: Vec<[u8; 32]> = self
            .peers
            .values()
            .filter(|p| Some(p.id) != local_id && now.saturating_duration_since(p.last_seen) > liveness_ttl)
            .map(|p| p.id)
            .collect();
        for id in &stale {
            self.peers.remove(id);
        }
        stale
    }

    /// Number of entries currently in the table (including the local
    /// node's own record, if set).
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// A snapshot of every record currently known.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.values().cloned().collect()
    }

    /// Snapshot restricted to peers with a known direct IP (useful for
    /// any caller that wants to render a map or similar).
    pub fn peers_with_ips(&self) -> Vec<PeerRecord> {
        self.peers.values().filter(|p| p.direct_ip.is_some()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn add_or_update_admits_new_peer() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        let was_new = table.add_or_update(id(1), 1, now, None);
        assert!(was_new);
        assert_eq!(table.get(&id(1)).unwrap().seq, 1);
    }

    #[test]
    fn add_or_update_rejects_regression() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        table.add_or_update(id(1), 5, now, None);
        let was_new = table.add_or_update(id(1), 3, now, None);
        assert!(!was_new);
        assert_eq!(table.get(&id(1)).unwrap().seq, 5);
    }

    #[test]
    fn add_or_update_rejects_equal_seq() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        table.add_or_update(id(1), 5, now, None);
        let was_new = table.add_or_update(id(1), 5, now, None);
        assert!(!was_new);
    }

    #[test]
    fn add_or_update_accepts_strictly_greater_seq() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        table.add_or_update(id(1), 5, now, None);
        let was_new = table.add_or_update(id(1), 6, now, None);
        assert!(!was_new); // not a *new* identity, just an update
        assert_eq!(table.get(&id(1)).unwrap().seq, 6);
    }

    #[test]
    fn rejects_new_peer_when_table_is_full() {
        let now = Instant::now();
        let mut table = PeerTable::new();
        for i in 0..MAX_PEERS {
            let mut raw = [0u8; 32];
            raw[..8].copy_from_slice(&(i as u64).to_be_bytes());
            table.add_or_update(raw, 1, now, None);
        }
        assert_eq!(table.size(), MAX_PEERS);
        let mut overflow_id = [0u8; 32];
        overflow_id[..8].copy_from_slice(&(MAX_PEERS as u64 + 1).to_be_bytes());
        let was_new = table.add_or_update(overflow_id, 1, now, None);
        assert!(!was_new);
        assert_eq!(table.size(), MAX_PEERS);
    }

    #[test]
    fn sweep_stale_evicts_only_expired_peers() {
        let mut table = PeerTable::new();
        let base = Instant::now();
        table.add_or_update(id(1), 1, base, None);
        let later = base + Duration::from_secs(10);
        table.add_or_update(id(2), 1, later, None);

        let evicted = table.sweep_stale(later + Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(evicted, vec![id(1)]);
        assert!(table.get(&id(1)).is_none());
        assert!(table.get(&id(2)).is_some());
    }

    #[test]
    fn sweep_stale_exempts_local_record() {
        let mut table = PeerTable::new();
        let base = Instant::now();
        table.set_local_id(id(9));
        table.add_or_update(id(9), 1, base, None);
        let evicted = table.sweep_stale(base + Duration::from_secs(1000), Duration::from_secs(5));
        assert!(evicted.is_empty());
        assert!(table.get(&id(9)).is_some());
    }

    #[test]
    fn remove_drops_entry() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        table.add_or_update(id(1), 1, now, None);
        assert!(table.remove(&id(1)).is_some());
        assert!(table.get(&id(1)).is_none());
    }

    #[test]
    fn direct_ip_set_only_from_explicit_update() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        table.add_or_update(id(1), 1, now, Some(ip));
        assert_eq!(table.get(&id(1)).unwrap().direct_ip, Some(ip));
        table.add_or_update(id(1), 2, now, None);
        // A later update with no direct_ip does not clear a previously
        // observed one.
        assert_eq!(table.get(&id(1)).unwrap().direct_ip, Some(ip));
    }

    #[test]
    fn peers_with_ips_filters_correctly() {
        let mut table = PeerTable::new();
        let now = Instant::now();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        table.add_or_update(id(1), 1, now, Some(ip));
        table.add_or_update(id(2), 1, now, None);
        let with_ips = table.peers_with_ips();
        assert_eq!(with_ips.len(), 1);
        assert_eq!(with_ips[0].id, id(1));
    }
}
