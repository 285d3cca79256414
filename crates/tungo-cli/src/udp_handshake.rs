//! Bridges the generic, stream-oriented handshake in `tungo_core::handshake`
//! onto a connectionless UDP peer.
//!
//! `client_handshake`/`server_handshake` only require `AsyncRead +
//! AsyncWrite`, so a `tokio::io::duplex` pair gives them a stream to talk
//! to for free; a small forwarder task relays each handshake message
//! (`u32_be(len) || payload`, exactly tungo-core's own wire framing) to
//! and from the real socket as one UDP datagram per message.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const HANDSHAKE_DUPLEX_CAPACITY: usize = 4096;

/// Runs the forwarder until the handshake side closes its end (handshake
/// finished, successfully or not) or the inbound channel closes. Returns
/// the inbound receiver so the caller can keep using it for the data
/// plane once the handshake is done.
async fn forward(
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    mut wire_side: DuplexStream,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
) -> mpsc::UnboundedReceiver<Vec<u8>> {
    loop {
        tokio::select! {
            outgoing = read_one_framed(&mut wire_side) => {
                match outgoing {
                    Ok(datagram) => {
                        let _ = socket.send_to(&datagram, peer_addr).await;
                    }
                    Err(_) => return inbound,
                }
            }
            datagram = inbound.recv() => {
                match datagram {
                    Some(d) => {
                        if wire_side.write_all(&d).await.is_err() {
                            return inbound;
                        }
                    }
                    None => return inbound,
                }
            }
        }
    }
}

async fn read_one_framed(io: &mut DuplexStream) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    io.read_exact(&mut payload).await?;
    let mut out = Vec::with_capacity(4 + len);
    out.extend_from_slice(&len_buf);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Runs `body` (a call into `tungo_core::client_handshake` or
/// `server_handshake`) against `peer_addr` over `socket`, forwarding
/// datagrams from `inbound` as the wire side. Returns `body`'s result
/// along with the (now unused-by-the-forwarder) inbound receiver, ready
/// to be handed to a [`crate::udp_transport::PeerUdpTransport`] for the
/// data plane.
pub async fn run_handshake<F, Fut, T, E>(
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    body: F,
) -> (Result<T, E>, mpsc::UnboundedReceiver<Vec<u8>>)
where
    F: FnOnce(DuplexStream) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let (app_side, wire_side) = tokio::io::duplex(HANDSHAKE_DUPLEX_CAPACITY);
    let forward_task = tokio::spawn(forward(socket, peer_addr, wire_side, inbound));

    let result = body(app_side).await;

    let inbound = forward_task
        .await
        .expect("handshake forwarder task does not panic");
    (result, inbound)
}
