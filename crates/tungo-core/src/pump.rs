//! Tunnel pump (C8): the two independent producer/consumer loops that move
//! IP packets between a TUN device and an encrypted transport.
//!
//! Mapped onto `tokio` tasks per spec.md §9's "parallel threads or
//! OS-thread-equivalent tasks" contract: each direction is one task, and a
//! shared [`CancellationToken`] stands in for the "shared cancellation
//! scope" spec.md §4.8/§5 requires. Packet-scoped errors are logged and
//! skipped; connection-scoped errors cancel the token and return.

use std::sync::Arc;

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::PumpError;
use crate::framing::{self, MAX_PACKET_BYTES};
use crate::session::{TcpSession, UdpSession};

/// Maximum single IP packet size the pump will read from (or write to) the
/// TUN device. Matches `MAX_PACKET_BYTES` minus AEAD/framing overhead
/// headroom; oversized reads are a TUN I/O error, not a protocol one.
const MAX_TUN_PACKET_BYTES: usize = MAX_PACKET_BYTES as usize;

/// Drives one TCP session: TUN->transport and transport->TUN, concurrently,
/// until either loop hits a connection-fatal error or `cancel` fires.
///
/// `tun` and `transport` are split into independent read/write halves so
/// each direction only ever touches its own half — the send side never
/// borrows the receive side's cursor, matching the single-writer-per-
/// direction ownership spec.md §5 requires.
pub async fn run_tcp_pump<Tun, Transport>(
    session: Arc<TcpSession>,
    tun: Tun,
    transport: Transport,
    cancel: CancellationToken,
) -> Result<(), PumpError>
where
    Tun: AsyncRead + AsyncWrite + Unpin + Send,
    Transport: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut tun_read, mut tun_write) = split(tun);
    let (mut transport_read, mut transport_write) = split(transport);

    let mut tun_buf = vec![0u8; MAX_TUN_PACKET_BYTES];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(PumpError::Cancelled),

            read = tun_read.read(&mut tun_buf) => {
                let n = read.map_err(PumpError::Tun)?;
                if n == 0 {
                    cancel.cancel();
                    return Err(PumpError::Tun(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "TUN closed")));
                }
                let ciphertext = session.encrypt(&tun_buf[..n]).map_err(|e| { cancel.cancel(); PumpError::Session(e) })?;
                framing::write_tcp_record(&mut transport_write, &ciphertext).await.map_err(|e| { cancel.cancel(); PumpError::Framing(e) })?;
            }

            record = framing::read_tcp_record(&mut transport_read) => {
                let ciphertext = record.map_err(|e| { cancel.cancel(); PumpError::Framing(e) })?;
                let plaintext = session.decrypt(&ciphertext).map_err(|e| { cancel.cancel(); PumpError::Session(e) })?;
                tun_write.write_all(&plaintext).await.map_err(PumpError::Tun)?;
            }
        }
    }
}

/// Drives one UDP session. Unlike the TCP pump, a malformed datagram or a
/// replay/decrypt failure is packet-scoped: it is logged and the loop
/// continues, since the transport itself has no framing state to
/// desynchronize.
pub async fn run_udp_pump<Tun, Transport>(
    session: Arc<UdpSession>,
    tun: Tun,
    transport: Transport,
    cancel: CancellationToken,
) -> Result<(), PumpError>
where
    Tun: AsyncRead + AsyncWrite + Unpin + Send,
    Transport: UdpTransport + Send,
{
    let (mut tun_read, mut tun_write) = split(tun);
    let mut tun_buf = vec![0u8; MAX_TUN_PACKET_BYTES];
    let mut datagram_buf = vec![0u8; MAX_TUN_PACKET_BYTES + 64];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(PumpError::Cancelled),

            read = tun_read.read(&mut tun_buf) => {
                let n = read.map_err(PumpError::Tun)?;
                if n == 0 {
                    cancel.cancel();
                    return Err(PumpError::Tun(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "TUN closed")));
                }
                match session.encrypt(&tun_buf[..n]) {
                    Ok(datagram) => {
                        if let Err(e) = transport.send(&datagram).await {
                            cancel.cancel();
                            return Err(PumpError::Transport(e));
                        }
                    }
                    Err(e) => {
                        // Nonce overflow is connection-fatal; AEAD seal never
                        // fails otherwise in this path.
                        cancel.cancel();
                        return Err(PumpError::Session(e));
                    }
                }
            }

            received = transport.recv(&mut datagram_buf) => {
                let n = match received {
                    Ok(n) => n,
                    Err(e) => { cancel.cancel(); return Err(PumpError::Transport(e)); }
                };
                match framing::decode_udp_datagram(&datagram_buf[..n]) {
                    Ok(datagram) => match session.decrypt(datagram) {
                        Ok(plaintext) => {
                            if let Err(e) = tun_write.write_all(&plaintext).await {
                                return Err(PumpError::Tun(e));
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping udp packet"),
                    },
                    Err(e) => tracing::warn!(error = %e, "dropping malformed udp datagram"),
                }
            }
        }
    }
}

/// The send/receive surface the UDP pump needs from a datagram socket.
/// Abstracted so tests can substitute an in-memory channel pair instead of
/// a real `UdpSocket`.
#[async_trait::async_trait]
pub trait UdpTransport {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<()>;
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::sync::Mutex;
    use tokio::io::duplex;
    use tokio::sync::mpsc;

    struct ChannelTransport {
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl UdpTransport for ChannelTransport {
        async fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
            self.tx.send(datagram.to_vec()).map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut rx = self.rx.lock().unwrap();
            let datagram = rx.recv().await.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))?;
            buf[..datagram.len()].copy_from_slice(&datagram);
            Ok(datagram.len())
        }
    }

    #[tokio::test]
    async fn tcp_pump_moves_one_packet_each_way_then_stops_on_cancel() {
        let session_id = [1u8; 32];
        let client_session = Arc::new(Session::new(session_id, false, [1u8; 32], [2u8; 32]).into_tcp());
        let server_session = Arc::new(Session::new(session_id, true, [2u8; 32], [1u8; 32]).into_tcp());

        let (client_tun_a, mut client_tun_b) = duplex(4096);
        let (transport_client, transport_server) = duplex(4096);
        let (server_tun_a, mut server_tun_b) = duplex(4096);

        let cancel = CancellationToken::new();
        let client_cancel = cancel.clone();
        let server_cancel = cancel.clone();

        let client_task = tokio::spawn(run_tcp_pump(client_session, client_tun_a, transport_client, client_cancel));
        let server_task = tokio::spawn(run_tcp_pump(server_session, server_tun_a, transport_server, server_cancel));

        client_tun_b.write_all(b"ping-packet").await.unwrap();

        let mut got = vec![0u8; 64];
        let n = server_tun_b.read(&mut got).await.unwrap();
        assert_eq!(&got[..n], b"ping-packet");

        cancel.cancel();
        let _ = client_task.await.unwrap();
        let _ = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn udp_pump_moves_one_packet_each_way_then_stops_on_cancel() {
        let session_id = [1u8; 32];
        let client_session = Arc::new(Session::new(session_id, false, [1u8; 32], [2u8; 32]).into_udp(1024));
        let server_session = Arc::new(Session::new(session_id, true, [2u8; 32], [1u8; 32]).into_udp(1024));

        let (client_tun_a, mut client_tun_b) = duplex(4096);
        let (server_tun_a, mut server_tun_b) = duplex(4096);

        let (c2s_tx, c2s_rx) = mpsc::unbounded_channel();
        let (s2c_tx, s2c_rx) = mpsc::unbounded_channel();
        let client_transport = ChannelTransport { tx: c2s_tx, rx: Mutex::new(s2c_rx) };
        let server_transport = ChannelTransport { tx: s2c_tx, rx: Mutex::new(c2s_rx) };

        let cancel = CancellationToken::new();
        let client_cancel = cancel.clone();
        let server_cancel = cancel.clone();

        let client_task = tokio::spawn(run_udp_pump(client_session, client_tun_a, client_transport, client_cancel));
        let server_task = tokio::spawn(run_udp_pump(server_session, server_tun_a, server_transport, server_cancel));

        client_tun_b.write_all(b"ping-datagram").await.unwrap();

        let mut got = vec![0u8; 64];
        let n = server_tun_b.read(&mut got).await.unwrap();
        assert_eq!(&got[..n], b"ping-datagram");

        cancel.cancel();
        let _ = client_task.await.unwrap();
        let _ = server_task.await.unwrap();
    }
}
