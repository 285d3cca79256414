use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tungo_config::{ClientConfig, TransportKind};
use tungo_core::{client_handshake, PinnedServerKey};
use tungo_tun::{TunConfig, TunDevice};

use crate::udp_transport::ClientUdpTransport;

/// Default point-to-point tunnel shape; tungo-config's `ClientConfig`
/// carries only the tunnel IP (spec.md §6), so the rest of the TUN
/// interface's parameters are fixed here rather than exposed as more
/// config knobs this system does not otherwise need.
const TUN_NETMASK: &str = "255.255.255.0";
const TUN_MTU: i32 = 1420;

pub async fn run(config: ClientConfig) -> Result<()> {
    let tunnel_ip = config
        .tunnel_ip
        .clone()
        .context("client config is missing tunnel_ip")?;
    let pinned = PinnedServerKey(config.server_public_key);
    let deadline = Duration::from_millis(config.dial_timeout_ms);

    let tun_config = TunConfig::new(&tunnel_ip, &tunnel_ip, TUN_NETMASK, TUN_MTU)?;
    let tun = TunDevice::open(&tun_config)?;
    let cancel = CancellationToken::new();

    match config.transport {
        TransportKind::Tcp => {
            let mut stream = TcpStream::connect(&config.server_addr)
                .await
                .with_context(|| format!("failed to connect to {}", config.server_addr))?;
            tracing::info!(server = %config.server_addr, "tcp connected, starting handshake");

            let session = client_handshake(&mut stream, &tunnel_ip, 4, pinned, deadline).await?;
            tracing::info!(session_id = %hex::encode(session.session_id()), "handshake complete");

            tungo_core::run_tcp_pump(Arc::new(session.into_tcp()), tun, stream, cancel).await?;
        }
        TransportKind::Udp => {
            let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
            socket.connect(&config.server_addr).await.with_context(|| {
                format!("failed to associate udp socket with {}", config.server_addr)
            })?;
            let peer_addr = socket.peer_addr()?;
            tracing::info!(server = %peer_addr, "udp associated, starting handshake");

            let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel();
            let demux_socket = socket.clone();
            let demux_task = tokio::spawn(async move {
                let mut buf = vec![0u8; 65_536];
                loop {
                    match demux_socket.recv(&mut buf).await {
                        Ok(n) => {
                            if inbound_tx.send(buf[..n].to_vec()).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "udp recv error, stopping demux");
                            return;
                        }
                    }
                }
            });

            let (result, inbound_rx) = crate::udp_handshake::run_handshake(
                socket.clone(),
                peer_addr,
                inbound_rx,
                |mut app_side| async move {
                    client_handshake(&mut app_side, &tunnel_ip, 4, pinned, deadline).await
                },
            )
            .await;
            let session = result?;
            tracing::info!(session_id = %hex::encode(session.session_id()), "handshake complete");

            // The demux task and `ClientUdpTransport` must never read the
            // socket concurrently; stop the former before the pump starts
            // reading directly.
            demux_task.abort();
            drop(inbound_rx);

            let transport = ClientUdpTransport::new(socket, peer_addr);
            let udp_session = Arc::new(session.into_udp(config.replay_window_size as usize));
            tungo_core::run_udp_pump(udp_session, tun, transport, cancel).await?;
        }
    }

    Ok(())
}
