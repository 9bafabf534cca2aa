//! # Reference Overlay Transport
//!
//! A plain TCP [`OverlaySocket`] implementation. Peer discovery (DHT) and
//! the encrypted stream underneath are out of scope (§6 non-goals) — this
//! is the minimal concrete transport the engine needs to exercise against
//! real sockets, wired up by `main` via a listener accept loop and a
//! dialer for `--peer` addresses.

use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use meshgossip_core::gossip::OverlaySocket;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// Wraps a [`TcpStream`] with the remote IP captured at accept/connect
/// time, satisfying [`OverlaySocket`].
pub struct OverlayTcpSocket {
    stream: TcpStream,
    remote_ip: IpAddr,
}

impl OverlayTcpSocket {
    pub fn new(stream: TcpStream, remote_ip: IpAddr) -> Self {
        Self { stream, remote_ip }
    }
}

impl OverlaySocket for OverlayTcpSocket {
    fn remote_address(&self) -> IpAddr {
        self.remote_ip
    }
}

impl AsyncRead for OverlayTcpSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for OverlayTcpSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
