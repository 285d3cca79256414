//! Per-direction AEAD session (C5).
//!
//! A `Session` produced by the handshake is transport-agnostic; the caller
//! (who knows whether it dialed TCP or UDP) commits it to one of the two
//! receive-state variants with [`Session::into_tcp`] / [`Session::into_udp`].
//! From then on the send half and receive half can be driven from separate
//! tasks: they touch disjoint state (`send_nonce` vs. `recv_nonce`/replay
//! window) and share only the immutable keys and `session_id`.

use std::sync::Mutex;

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit};

use crate::error::SessionError;
use crate::nonce::{Nonce, NONCE_LEN};
use crate::replay::ReplayWindow;

const DIRECTION_TAG_LEN: usize = 16;
const CLIENT_TO_SERVER: &[u8; DIRECTION_TAG_LEN] = b"client-to-server";
const SERVER_TO_CLIENT: &[u8; DIRECTION_TAG_LEN] = b"server-to-client";

/// Handshake output: keys and identifiers, not yet bound to a transport
/// kind. Immutable for the life of the connection.
pub struct Session {
    session_id: [u8; 32],
    is_server: bool,
    send_key: [u8; 32],
    recv_key: [u8; 32],
}

impl Session {
    pub fn new(session_id: [u8; 32], is_server: bool, send_key: [u8; 32], recv_key: [u8; 32]) -> Self {
        Self {
            session_id,
            is_server,
            send_key,
            recv_key,
        }
    }

    pub fn session_id(&self) -> [u8; 32] {
        self.session_id
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn into_tcp(self) -> TcpSession {
        TcpSession {
            session_id: self.session_id,
            is_server: self.is_server,
            send_cipher: ChaCha20Poly1305::new((&self.send_key).into()),
            recv_cipher: ChaCha20Poly1305::new((&self.recv_key).into()),
            send_nonce: Mutex::new(Nonce::new()),
            recv_nonce: Mutex::new(Nonce::new()),
        }
    }

    pub fn into_udp(self, replay_window_capacity: usize) -> UdpSession {
        UdpSession {
            session_id: self.session_id,
            is_server: self.is_server,
            send_cipher: ChaCha20Poly1305::new((&self.send_key).into()),
            recv_cipher: ChaCha20Poly1305::new((&self.recv_key).into()),
            send_nonce: Mutex::new(Nonce::new()),
            replay: ReplayWindow::new(replay_window_capacity),
        }
    }
}

fn send_direction_tag(is_server: bool) -> &'static [u8; DIRECTION_TAG_LEN] {
    if is_server {
        SERVER_TO_CLIENT
    } else {
        CLIENT_TO_SERVER
    }
}

fn recv_direction_tag(is_server: bool) -> &'static [u8; DIRECTION_TAG_LEN] {
    if is_server {
        CLIENT_TO_SERVER
    } else {
        SERVER_TO_CLIENT
    }
}

fn build_aad(session_id: &[u8; 32], direction_tag: &[u8; DIRECTION_TAG_LEN], nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(32 + DIRECTION_TAG_LEN + NONCE_LEN);
    aad.extend_from_slice(session_id);
    aad.extend_from_slice(direction_tag);
    aad.extend_from_slice(nonce);
    aad
}

/// TCP variant: the receive nonce is a deterministic counter that must track
/// the peer's send counter exactly, relying on TCP's in-order, reliable
/// delivery.
pub struct TcpSession {
    session_id: [u8; 32],
    is_server: bool,
    send_cipher: ChaCha20Poly1305,
    recv_cipher: ChaCha20Poly1305,
    send_nonce: Mutex<Nonce>,
    recv_nonce: Mutex<Nonce>,
}

impl TcpSession {
    pub fn session_id(&self) -> [u8; 32] {
        self.session_id
    }

    /// Encrypts one packet for the send direction. The nonce is never
    /// transmitted; the peer reconstructs it by counting received records.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut nonce = self.send_nonce.lock().unwrap();
        nonce.increment()?;
        let encoded = nonce.encode();
        let aad = build_aad(&self.session_id, send_direction_tag(self.is_server), &encoded);

        self.send_cipher
            .encrypt(&encoded.into(), Payload { msg: plaintext, aad: &aad })
            .map_err(|_| SessionError::Decrypt)
    }

    /// Decrypts one packet from the receive direction, advancing the local
    /// receive counter in lockstep with the peer's send counter.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut nonce = self.recv_nonce.lock().unwrap();
        nonce.increment()?;
        let encoded = nonce.encode();
        let aad = build_aad(&self.session_id, recv_direction_tag(self.is_server), &encoded);

        self.recv_cipher
            .decrypt(&encoded.into(), Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| SessionError::Decrypt)
    }
}

/// UDP variant: nonces travel on the wire and are checked against a replay
/// window rather than a strict counter, since datagrams may arrive
/// out of order or be lost.
pub struct UdpSession {
    session_id: [u8; 32],
    is_server: bool,
    send_cipher: ChaCha20Poly1305,
    recv_cipher: ChaCha20Poly1305,
    send_nonce: Mutex<Nonce>,
    replay: ReplayWindow,
}

impl UdpSession {
    pub fn session_id(&self) -> [u8; 32] {
        self.session_id
    }

    /// Encrypts one packet, returning `nonce (12) || ciphertext+tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut nonce = self.send_nonce.lock().unwrap();
        nonce.increment()?;
        let encoded = nonce.encode();
        let aad = build_aad(&self.session_id, send_direction_tag(self.is_server), &encoded);

        let ciphertext = self
            .send_cipher
            .encrypt(&encoded.into(), Payload { msg: plaintext, aad: &aad })
            .map_err(|_| SessionError::Decrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&encoded);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts `nonce (12) || ciphertext+tag`. A duplicate nonce is
    /// rejected before the AEAD is even attempted; a failed AEAD open does
    /// *not* remove the nonce from the window (spec.md §9, open question 1).
    pub fn decrypt(&self, datagram: &[u8]) -> Result<Vec<u8>, SessionError> {
        if datagram.len() < NONCE_LEN {
            return Err(SessionError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = datagram.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes.try_into().unwrap();

        self.replay.insert(nonce_array)?;

        let aad = build_aad(&self.session_id, recv_direction_tag(self.is_server), &nonce_array);
        self.recv_cipher
            .decrypt(&nonce_array.into(), Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| SessionError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paired_sessions() -> (TcpSession, TcpSession) {
        let session_id = [7u8; 32];
        let key_a = [1u8; 32];
        let key_b = [2u8; 32];
        let client = Session::new(session_id, false, key_a, key_b).into_tcp();
        let server = Session::new(session_id, true, key_b, key_a).into_tcp();
        (client, server)
    }

    fn paired_udp_sessions() -> (UdpSession, UdpSession) {
        let session_id = [7u8; 32];
        let key_a = [1u8; 32];
        let key_b = [2u8; 32];
        let client = Session::new(session_id, false, key_a, key_b).into_udp(1024);
        let server = Session::new(session_id, true, key_b, key_a).into_udp(1024);
        (client, server)
    }

    #[test]
    fn tcp_round_trip_client_to_server() {
        let (client, server) = paired_sessions();
        let ct = client.encrypt(b"hello").unwrap();
        let pt = server.decrypt(&ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn tcp_nonces_must_stay_in_lockstep() {
        let (client, server) = paired_sessions();
        for i in 0..5 {
            let ct = client.encrypt(format!("packet {i}").as_bytes()).unwrap();
            let pt = server.decrypt(&ct).unwrap();
            assert_eq!(pt, format!("packet {i}").as_bytes());
        }
    }

    #[test]
    fn scenario_s6_wrong_direction_tag_fails_decrypt() {
        let session_id = [7u8; 32];
        let key_a = [1u8; 32];
        let key_b = [2u8; 32];
        let client = Session::new(session_id, false, key_a, key_b).into_tcp();
        // `attacker` shares keys but is built as if it were the client too,
        // so decrypting with it uses the client's own direction tag instead
        // of the server's.
        let attacker_as_client = Session::new(session_id, false, key_b, key_a).into_tcp();

        let ct = client.encrypt(b"secret").unwrap();
        assert!(attacker_as_client.decrypt(&ct).is_err());
    }

    #[test]
    fn udp_round_trip_out_of_order() {
        let (client, server) = paired_udp_sessions();
        let first = client.encrypt(b"one").unwrap();
        let second = client.encrypt(b"two").unwrap();

        // Deliver out of order; the replay window tolerates this.
        assert_eq!(server.decrypt(&second).unwrap(), b"two");
        assert_eq!(server.decrypt(&first).unwrap(), b"one");
    }

    #[test]
    fn udp_replay_is_rejected() {
        let (client, server) = paired_udp_sessions();
        let datagram = client.encrypt(b"one").unwrap();
        server.decrypt(&datagram).unwrap();
        assert!(matches!(server.decrypt(&datagram), Err(SessionError::NonUniqueNonce)));
    }

    #[test]
    fn udp_malformed_short_datagram_fails() {
        let (_, server) = paired_udp_sessions();
        assert!(server.decrypt(&[0u8; 4]).is_err());
    }
}
