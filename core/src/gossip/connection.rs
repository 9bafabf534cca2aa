//! # Connection Manager
//!
//! Accepts new peer sockets from the overlay, sends the initial hello,
//! reads framed messages, tracks per-socket peer-id binding, and handles
//! close/error (§4.7). The overlay transport itself — DHT discovery, the
//! encrypted stream underneath — is an external collaborator; this module
//! only needs an [`OverlaySocket`]: an ordered, reliable, bidirectional
//! byte stream with a known remote address.
//!
//! Per §5, socket reads and writes happen on independent tasks; writes to
//! a given socket are serialized through a per-connection outbox so
//! framing can never interleave. Inbound messages and lifecycle events
//! are funneled through a single channel into the engine loop, which is
//! the sole writer of Peer Table / Dedup / rate-limiter state.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::wire::{decode_line, encode_line, split_lines, DecodeError, WireMessage};

/// An ordered, reliable, bidirectional byte stream to a peer that has
/// mutually joined the overlay topic, as handed to us by the external
/// overlay/transport collaborator (§6).
pub trait OverlaySocket: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// The address observed for this connection, captured on a 0-hop
    /// delivery as a peer's `directIp` (§3).
    fn remote_address(&self) -> IpAddr;
}

/// Opaque identifier for one physical connection — distinct from a peer's
/// node identifier, since the engine tolerates duplicate connections to
/// the same peer (§4.7) before the Peer Table deduplicates at the id level.
pub type ConnId = u64;

/// Events the Connection Manager hands to the engine loop.
#[derive(Debug)]
pub enum InboundEvent {
    /// A newly accepted socket, before any message has arrived on it.
    Accepted { conn_id: ConnId, remote_ip: IpAddr },
    /// A fully decoded message arrived on `conn_id`.
    Message {
        conn_id: ConnId,
        remote_ip: IpAddr,
        msg: WireMessage,
    },
    /// A line failed to decode. Carried through so the engine can bump
    /// the right diagnostics counter without this module depending on it.
    DecodeFailed { conn_id: ConnId, reason: DecodeError },
    /// The socket closed or errored; treated identically either way (§4.7).
    Closed { conn_id: ConnId },
}

struct ConnectionHandle {
    remote_ip: IpAddr,
    peer_id: Option<[u8; 32]>,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
}

/// Tracks every live connection and its optional bound peer id. The
/// engine loop is the only writer; reads happen from whichever component
/// needs to decide where to relay a message.
#[derive(Default)]
pub struct ConnectionManager {
    connections: HashMap<ConnId, ConnectionHandle>,
    next_conn_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Accept a freshly connected socket: split it into independent
    /// read/write halves, spawn a write task fed by an outbox channel
    /// (serializing writes), spawn a read task that frames and decodes
    /// inbound lines, and register the connection. Returns the assigned
    /// `ConnId` the caller can immediately use to send the hello.
    pub fn accept<S: OverlaySocket>(&mut self, socket: S, inbound: mpsc::UnboundedSender<InboundEvent>) -> ConnId {
        let conn_id = self.allocate_conn_id();
        let remote_ip = socket.remote_address();
        let (mut reader, mut writer) = tokio::io::split(socket);

        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.connections.insert(
            conn_id,
            ConnectionHandle {
                remote_ip,
                peer_id: None,
                outbox: outbox_tx,
            },
        );

        tokio::spawn(async move {
            while let Some(bytes) = outbox_rx.recv().await {
                if writer.write_all(&bytes).await.is_err() {
                    break;
                }
            }
        });

        let read_inbound = inbound.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        for line in split_lines(&mut buf) {
                            match decode_line(&line) {
                                Ok(msg) => {
                                    let _ = read_inbound.send(InboundEvent::Message {
                                        conn_id,
                                        remote_ip,
                                        msg,
                                    });
                                }
                                Err(reason) => {
                                    trace!(?reason, conn_id, "dropped undecodable frame");
                                    let _ = read_inbound.send(InboundEvent::DecodeFailed { conn_id, reason });
                                }
                            }
                        }
                    }
                    Err(err) => {
                        warn!(conn_id, %err, "socket read error, closing connection");
                        break;
                    }
                }
            }
            let _ = read_inbound.send(InboundEvent::Closed { conn_id });
        });

        let _ = inbound.send(InboundEvent::Accepted { conn_id, remote_ip });
        conn_id
    }

    /// Record the node identifier bound to a 0-hop connection, per §4.5
    /// step 6: `sourceSocket.peerId = id`.
    pub fn bind_peer_id(&mut self, conn_id: ConnId, id: [u8; 32]) {
        if let Some(handle) = self.connections.get_mut(&conn_id) {
            handle.peer_id = Some(id);
        }
    }

    pub fn peer_id_of(&self, conn_id: ConnId) -> Option<[u8; 32]> {
        self.connections.get(&conn_id).and_then(|h| h.peer_id)
    }

    pub fn remote_ip_of(&self, conn_id: ConnId) -> Option<IpAddr> {
        self.connections.get(&conn_id).map(|h| h.remote_ip)
    }

    /// Remove a closed connection, returning the peer id it was bound to
    /// (if any) so the caller can decide on Peer Table eviction per the
    /// §9 design note (prefer TTL-based eviction; direct-disconnect
    /// eviction only matters when this was the peer's last known path).
    pub fn remove(&mut self, conn_id: ConnId) -> Option<[u8; 32]> {
        self.connections.remove(&conn_id).and_then(|h| h.peer_id)
    }

    /// Send a single wire message to one connection's outbox. If the
    /// connection's outbound buffer is closed (peer gone), the write is
    /// simply dropped — gossip tolerates loss and the engine loop must
    /// never block on a stalled peer (§5 backpressure).
    pub fn send(&self, conn_id: ConnId, msg: &WireMessage) {
        if let Some(handle) = self.connections.get(&conn_id) {
            let mut bytes = encode_line(msg);
            bytes.push(b'\n');
            let _ = handle.outbox.send(bytes);
        }
    }

    /// Send a message to every connection except `exclude`, implementing
    /// the "exclude the source socket" relay rule (§4.5, §4.6 step 2).
    pub fn broadcast_except(&self, exclude: Option<ConnId>, msg: &WireMessage) {
        let mut bytes = encode_line(msg);
        bytes.push(b'\n');
        for (&conn_id, handle) in &self.connections {
            if Some(conn_id) == exclude {
                continue;
            }
            let _ = handle.outbox.send(bytes.clone());
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn direct_connection_ids(&self) -> Vec<[u8; 32]> {
        self.connections.values().filter_map(|h| h.peer_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::DuplexStream;

    struct TestSocket {
        inner: DuplexStream,
        addr: IpAddr,
    }

    impl AsyncRead for TestSocket {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TestSocket {
        fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }
        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }
        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl OverlaySocket for TestSocket {
        fn remote_address(&self) -> IpAddr {
            self.addr
        }
    }

    #[tokio::test]
    async fn accept_registers_connection_and_emits_accepted_event() {
        let (client, server) = tokio::io::duplex(4096);
        let socket = TestSocket {
            inner: server,
            addr: "127.0.0.1".parse().unwrap(),
        };
        let mut manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn_id = manager.accept(socket, tx);

        assert_eq!(manager.connection_count(), 1);
        match rx.recv().await.unwrap() {
            InboundEvent::Accepted { conn_id: id, .. } => assert_eq!(id, conn_id),
            other => panic!("expected Accepted, got {other:?}"),
        }
        drop(client);
    }

    #[tokio::test]
    async fn inbound_line_is_decoded_and_forwarded() {
        let (mut client, server) = tokio::io::duplex(4096);
        let socket = TestSocket {
            inner: server,
            addr: "10.0.0.5".parse().unwrap(),
        };
        let mut manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.accept(socket, tx);

        // Drain the Accepted event.
        let _ = rx.recv().await.unwrap();

        let line = br#"{"type":"LEAVE","id":"aa","hops":0,"sig":"bb"}"#;
        client.write_all(line).await.unwrap();
        client.write_all(b"\n").await.unwrap();

        match rx.recv().await.unwrap() {
            InboundEvent::Message { msg: WireMessage::Leave { .. }, .. } => {}
            other => panic!("expected a decoded LEAVE message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closing_the_socket_emits_closed_event() {
        let (client, server) = tokio::io::duplex(4096);
        let socket = TestSocket {
            inner: server,
            addr: "10.0.0.5".parse().unwrap(),
        };
        let mut manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.accept(socket, tx);
        let _ = rx.recv().await.unwrap(); // Accepted

        drop(client);

        match rx.recv().await.unwrap() {
            InboundEvent::Closed { .. } => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[test]
    fn remove_returns_bound_peer_id() {
        let mut manager = ConnectionManager::new();
        let conn_id = 1;
        manager.connections.insert(
            conn_id,
            ConnectionHandle {
                remote_ip: "127.0.0.1".parse().unwrap(),
                peer_id: Some([7u8; 32]),
                outbox: mpsc::unbounded_channel().0,
            },
        );
        let removed = manager.remove(conn_id);
        assert_eq!(removed, Some([7u8; 32]));
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn broadcast_except_skips_the_excluded_connection() {
        let mut manager = ConnectionManager::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.connections.insert(
            1,
            ConnectionHandle {
                remote_ip: "127.0.0.1".parse().unwrap(),
                peer_id: None,
                outbox: tx_a,
            },
        );
        manager.connections.insert(
            2,
            ConnectionHandle {
                remote_ip: "127.0.0.1".parse().unwrap(),
                peer_id: None,
                outbox: tx_b,
            },
        );

        let msg = WireMessage::Leave {
            id: "aa".to_string(),
            hops: 0,
            sig: "bb".to_string(),
        };
        manager.broadcast_except(Some(1), &msg);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
