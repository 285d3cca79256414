//! Wraps the `tun` crate's async device behind a small typed
//! configuration surface, the way the teacher wraps `mdns-sd`/`if-addrs`
//! behind `mdns-core`'s `model`/`net` modules.

use std::io;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::TunError;

/// Address, destination, netmask, and MTU for a point-to-point TUN
/// interface — the parameters spec.md §6 says the TUN collaborator is
/// configured with.
#[derive(Debug, Clone)]
pub struct TunConfig {
    pub address: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mtu: i32,
}

impl TunConfig {
    pub fn new(address: &str, destination: &str, netmask: &str, mtu: i32) -> Result<Self, TunError> {
        Ok(Self {
            address: parse_ipv4(address)?,
            destination: parse_ipv4(destination)?,
            netmask: parse_ipv4(netmask)?,
            mtu,
        })
    }
}

fn parse_ipv4(s: &str) -> Result<Ipv4Addr, TunError> {
    s.parse().map_err(|e| TunError::InvalidAddress(s.to_string(), e))
}

/// A single platform TUN interface, exposed as whole IP packets in and out
/// — one `read`/`write` call per packet, as the pump (tungo-core's C8)
/// expects.
pub struct TunDevice {
    inner: tun::AsyncDevice,
}

impl TunDevice {
    pub fn open(config: &TunConfig) -> Result<Self, TunError> {
        let mut tun_config = tun::Configuration::default();
        tun_config
            .address(config.address)
            .destination(config.destination)
            .netmask(config.netmask)
            .mtu(config.mtu)
            .up();

        #[cfg(target_os = "linux")]
        tun_config.platform(|platform| {
            platform.packet_information(false);
        });

        let inner = tun::create_as_async(&tun_config)?;
        tracing::info!(address = %config.address, mtu = config.mtu, "opened tun device");
        Ok(Self { inner })
    }
}

impl AsyncRead for TunDevice {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TunDevice {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
