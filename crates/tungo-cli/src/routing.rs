//! Server-level table mapping a client's assigned tunnel IP to its
//! outbound send handle, per spec.md §4.8.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

#[derive(Default)]
pub struct RoutingTable {
    routes: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tunnel_ip: String, sender: mpsc::UnboundedSender<Vec<u8>>) {
        self.routes.lock().unwrap().insert(tunnel_ip, sender);
    }

    pub fn remove(&self, tunnel_ip: &str) {
        self.routes.lock().unwrap().remove(tunnel_ip);
    }

    /// Routes `packet` to the session whose tunnel IP matches the
    /// packet's IPv4/IPv6 destination address; silently dropped if no
    /// session claims that address (e.g. a packet for an address the
    /// server has not yet, or no longer, allocated).
    pub fn route(&self, packet: &[u8]) {
        let Some(dest) = destination_address(packet) else {
            return;
        };
        let routes = self.routes.lock().unwrap();
        if let Some(sender) = routes.get(&dest) {
            let _ = sender.send(packet.to_vec());
        }
    }
}

/// Reads the destination address out of an IPv4 or IPv6 header without
/// validating checksums or options; malformed/truncated packets are
/// treated as unroutable rather than rejected here (the session layer
/// below already validates integrity).
fn destination_address(packet: &[u8]) -> Option<String> {
    let version = packet.first()? >> 4;
    match version {
        4 => {
            if packet.len() < 20 {
                return None;
            }
            Some(format!("{}.{}.{}.{}", packet[16], packet[17], packet[18], packet[19]))
        }
        6 => {
            if packet.len() < 40 {
                return None;
            }
            let addr: [u8; 16] = packet[24..40].try_into().ok()?;
            Some(std::net::Ipv6Addr::from(addr).to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_packet(dest: [u8; 4]) -> Vec<u8> {
        let mut packet = vec![0u8; 20];
        packet[0] = 0x45;
        packet[16..20].copy_from_slice(&dest);
        packet
    }

    #[test]
    fn routes_to_registered_tunnel_ip() {
        let table = RoutingTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.insert("10.8.0.2".to_string(), tx);

        table.route(&ipv4_packet([10, 8, 0, 2]));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unregistered_destination_is_dropped_silently() {
        let table = RoutingTable::new();
        table.route(&ipv4_packet([10, 8, 0, 9]));
    }

    #[test]
    fn removed_route_stops_receiving() {
        let table = RoutingTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.insert("10.8.0.2".to_string(), tx);
        table.remove("10.8.0.2");

        table.route(&ipv4_packet([10, 8, 0, 2]));
        assert!(rx.try_recv().is_err());
    }
}
