use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tungo_config::{ServerConfig, TransportKind};
use tungo_core::{server_handshake, ServerIdentity};
use tungo_tun::{TunConfig, TunDevice};

use crate::channel_io::ChannelIo;
use crate::routing::RoutingTable;
use crate::udp_transport::PeerUdpTransport;

const TUN_ADDRESS: &str = "10.8.0.1";
const TUN_NETMASK: &str = "255.255.255.0";
const TUN_MTU: i32 = 1420;
const MAX_PACKET_BYTES: usize = 65_536;

pub async fn run(config: ServerConfig) -> Result<()> {
    let identity =
        ServerIdentity::load(&config.identity_key_path).context("failed to load server identity")?;
    let identity = Arc::new(identity);

    let tun_config = TunConfig::new(TUN_ADDRESS, TUN_ADDRESS, TUN_NETMASK, TUN_MTU)?;
    let tun = TunDevice::open(&tun_config)?;
    let (mut tun_read, tun_write) = tokio::io::split(tun);

    let routes = Arc::new(RoutingTable::new());
    let (tun_writer_tx, mut tun_writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    // Single writer for the shared TUN device: every session's decrypted
    // plaintext funnels through this one task.
    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let mut tun_write = tun_write;
        while let Some(packet) = tun_writer_rx.recv().await {
            if let Err(e) = tun_write.write_all(&packet).await {
                tracing::error!(error = %e, "tun write failed, stopping writer");
                return;
            }
        }
    });

    // Single reader for the shared TUN device: route each packet by
    // destination IP to the session that owns it.
    let router_routes = routes.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_BYTES];
        loop {
            match tun_read.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => router_routes.route(&buf[..n]),
                Err(e) => {
                    tracing::error!(error = %e, "tun read failed, stopping router");
                    return;
                }
            }
        }
    });

    let deadline = Duration::from_millis(config.dial_timeout_ms);
    let replay_window_size = config.replay_window_size as usize;

    match config.transport {
        TransportKind::Tcp => {
            run_tcp_server(&config.listen_addr, identity, deadline, routes, tun_writer_tx).await
        }
        TransportKind::Udp => {
            run_udp_server(&config.listen_addr, identity, deadline, replay_window_size, routes, tun_writer_tx)
                .await
        }
    }
}

async fn run_tcp_server(
    listen_addr: &str,
    identity: Arc<ServerIdentity>,
    deadline: Duration,
    routes: Arc<RoutingTable>,
    tun_writer_tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(%listen_addr, "tcp server listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let identity = identity.clone();
        let routes = routes.clone();
        let tun_writer_tx = tun_writer_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_tcp_client(stream, peer_addr, identity, deadline, routes, tun_writer_tx).await {
                tracing::warn!(%peer_addr, error = %e, "client session ended");
            }
        });
    }
}

async fn handle_tcp_client(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    identity: Arc<ServerIdentity>,
    deadline: Duration,
    routes: Arc<RoutingTable>,
    tun_writer_tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<()> {
    let (session, tunnel_ip) = server_handshake(&mut stream, &identity, deadline).await?;
    tracing::info!(%peer_addr, %tunnel_ip, "tcp handshake complete");

    let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    routes.insert(tunnel_ip.clone(), to_peer_tx);
    let tun_stand_in = ChannelIo::new(to_peer_rx, tun_writer_tx);

    let cancel = CancellationToken::new();
    let result = tungo_core::run_tcp_pump(Arc::new(session.into_tcp()), tun_stand_in, stream, cancel).await;
    routes.remove(&tunnel_ip);
    result.map_err(anyhow::Error::from)
}

async fn run_udp_server(
    listen_addr: &str,
    identity: Arc<ServerIdentity>,
    deadline: Duration,
    replay_window_size: usize,
    routes: Arc<RoutingTable>,
    tun_writer_tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<()> {
    let socket = Arc::new(
        UdpSocket::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?,
    );
    tracing::info!(%listen_addr, "udp server listening");

    let peers: Arc<Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Vec<u8>>>>> =
        Arc::new(Mutex::new(HashMap::new()));

    let mut buf = vec![0u8; MAX_PACKET_BYTES];
    loop {
        let (n, peer_addr) = socket.recv_from(&mut buf).await?;
        let datagram = buf[..n].to_vec();

        let existing = peers.lock().unwrap().get(&peer_addr).cloned();
        if let Some(sender) = existing {
            let _ = sender.send(datagram);
            continue;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(datagram);
        peers.lock().unwrap().insert(peer_addr, tx);

        let socket = socket.clone();
        let identity = identity.clone();
        let routes = routes.clone();
        let tun_writer_tx = tun_writer_tx.clone();
        let peers = peers.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_udp_peer(
                socket,
                peer_addr,
                rx,
                identity,
                deadline,
                replay_window_size,
                routes,
                tun_writer_tx,
            )
            .await
            {
                tracing::warn!(%peer_addr, error = %e, "udp peer session ended");
            }
            peers.lock().unwrap().remove(&peer_addr);
        });
    }
}

async fn handle_udp_peer(
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    identity: Arc<ServerIdentity>,
    deadline: Duration,
    replay_window_size: usize,
    routes: Arc<RoutingTable>,
    tun_writer_tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<()> {
    let (result, inbound) = crate::udp_handshake::run_handshake(socket.clone(), peer_addr, inbound, |mut app_side| {
        let identity = identity.clone();
        async move { server_handshake(&mut app_side, &identity, deadline).await }
    })
    .await;
    let (session, tunnel_ip) = result?;
    tracing::info!(%peer_addr, %tunnel_ip, "udp handshake complete");

    let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    routes.insert(tunnel_ip.clone(), to_peer_tx);
    let tun_stand_in = ChannelIo::new(to_peer_rx, tun_writer_tx);
    let transport = PeerUdpTransport::new(socket, peer_addr, inbound);

    let cancel = CancellationToken::new();
    let session = Arc::new(session.into_udp(replay_window_size));
    let result = tungo_core::run_udp_pump(session, tun_stand_in, transport, cancel).await;
    routes.remove(&tunnel_ip);
    result.map_err(anyhow::Error::from)
}
