//! [`tungo_core::UdpTransport`] implementations for the two socket
//! ownership shapes the CLI needs: a client with one dedicated socket
//! dialed at a fixed peer, and a server multiplexing many peers over one
//! bound socket via a per-peer inbound channel.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tungo_core::UdpTransport;

/// Client side: the socket is exclusively ours and already effectively
/// pointed at one peer.
pub struct ClientUdpTransport {
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
}

impl ClientUdpTransport {
    pub fn new(socket: Arc<UdpSocket>, peer_addr: SocketAddr) -> Self {
        Self { socket, peer_addr }
    }
}

#[async_trait]
impl UdpTransport for ClientUdpTransport {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(datagram, self.peer_addr).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let (n, from) = self.socket.recv_from(buf).await?;
            if from == self.peer_addr {
                return Ok(n);
            }
            tracing::debug!(%from, expected = %self.peer_addr, "dropping datagram from unexpected peer");
        }
    }
}

/// Server side: the socket is shared across every connected peer. Sends
/// go straight to the socket; receives come from a per-peer channel fed
/// by the server's demux loop (one `UdpSocket::recv_from` call in total,
/// routed by source address).
pub struct PeerUdpTransport {
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl PeerUdpTransport {
    pub fn new(socket: Arc<UdpSocket>, peer_addr: SocketAddr, inbound: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            socket,
            peer_addr,
            inbound: Mutex::new(inbound),
        }
    }
}

#[async_trait]
impl UdpTransport for PeerUdpTransport {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(datagram, self.peer_addr).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inbound = self.inbound.lock().await;
        let datagram = inbound
            .recv()
            .await
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer channel closed"))?;
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(n)
    }
}
