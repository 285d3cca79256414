//! Bit-exact encoders/decoders for the three handshake messages (C3).

use crate::error::HandshakeError;

const MIN_IP_LEN: usize = 4;
const MAX_IP_LEN: usize = 39;

pub const ED25519_PUB_LEN: usize = 32;
pub const X25519_PUB_LEN: usize = 32;
pub const HELLO_NONCE_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// `ip_length (1) || ip_string (4..39) || ip_version (1) || ed25519_pub (32)
/// || x25519_pub (32) || client_nonce (32)`.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub ip: String,
    pub ip_version: u8,
    pub ed25519_pub: [u8; ED25519_PUB_LEN],
    pub x25519_pub: [u8; X25519_PUB_LEN],
    pub client_nonce: [u8; HELLO_NONCE_LEN],
}

impl ClientHello {
    pub fn encode(&self) -> Vec<u8> {
        let ip_bytes = self.ip.as_bytes();
        let mut out = Vec::with_capacity(1 + ip_bytes.len() + 1 + ED25519_PUB_LEN + X25519_PUB_LEN + HELLO_NONCE_LEN);
        out.push(ip_bytes.len() as u8);
        out.extend_from_slice(ip_bytes);
        out.push(self.ip_version);
        out.extend_from_slice(&self.ed25519_pub);
        out.extend_from_slice(&self.x25519_pub);
        out.extend_from_slice(&self.client_nonce);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, HandshakeError> {
        if buf.is_empty() {
            return Err(HandshakeError::WireFormat("empty ClientHello".into()));
        }
        let ip_len = buf[0] as usize;
        if !(MIN_IP_LEN..=MAX_IP_LEN).contains(&ip_len) {
            return Err(HandshakeError::WireFormat(format!(
                "ip length {} out of range [{}, {}]",
                ip_len, MIN_IP_LEN, MAX_IP_LEN
            )));
        }

        let expected_len = 1 + ip_len + 1 + ED25519_PUB_LEN + X25519_PUB_LEN + HELLO_NONCE_LEN;
        if buf.len() != expected_len {
            return Err(HandshakeError::WireFormat(format!(
                "ClientHello length {} does not match expected {}",
                buf.len(),
                expected_len
            )));
        }

        let mut cursor = 1;
        let ip = String::from_utf8(buf[cursor..cursor + ip_len].to_vec())
            .map_err(|_| HandshakeError::WireFormat("ip string is not valid utf-8".into()))?;
        cursor += ip_len;

        let ip_version = buf[cursor];
        if ip_version != 4 && ip_version != 6 {
            return Err(HandshakeError::WireFormat(format!(
                "invalid ip_version {ip_version}"
            )));
        }
        cursor += 1;

        let ed25519_pub = read_array(buf, &mut cursor);
        let x25519_pub = read_array(buf, &mut cursor);
        let client_nonce = read_array(buf, &mut cursor);

        Ok(Self {
            ip,
            ip_version,
            ed25519_pub,
            x25519_pub,
            client_nonce,
        })
    }
}

/// `ed25519_signature (64) || server_nonce (32) || x25519_pub (32)`.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub signature: [u8; SIGNATURE_LEN],
    pub server_nonce: [u8; HELLO_NONCE_LEN],
    pub x25519_pub: [u8; X25519_PUB_LEN],
}

impl ServerHello {
    pub const WIRE_LEN: usize = SIGNATURE_LEN + HELLO_NONCE_LEN + X25519_PUB_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.server_nonce);
        out.extend_from_slice(&self.x25519_pub);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, HandshakeError> {
        if buf.len() != Self::WIRE_LEN {
            return Err(HandshakeError::WireFormat(format!(
                "ServerHello length {} != {}",
                buf.len(),
                Self::WIRE_LEN
            )));
        }
        let mut cursor = 0;
        let signature = read_array(buf, &mut cursor);
        let server_nonce = read_array(buf, &mut cursor);
        let x25519_pub = read_array(buf, &mut cursor);
        Ok(Self {
            signature,
            server_nonce,
            x25519_pub,
        })
    }
}

/// `ed25519_signature (64)`.
#[derive(Debug, Clone)]
pub struct ClientSignature {
    pub signature: [u8; SIGNATURE_LEN],
}

impl ClientSignature {
    pub const WIRE_LEN: usize = SIGNATURE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        self.signature.to_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, HandshakeError> {
        if buf.len() != Self::WIRE_LEN {
            return Err(HandshakeError::WireFormat(format!(
                "ClientSignature length {} != {}",
                buf.len(),
                Self::WIRE_LEN
            )));
        }
        let mut cursor = 0;
        Ok(Self {
            signature: read_array(buf, &mut cursor),
        })
    }
}

fn read_array<const N: usize>(buf: &[u8], cursor: &mut usize) -> [u8; N] {
    let arr: [u8; N] = buf[*cursor..*cursor + N].try_into().unwrap();
    *cursor += N;
    arr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hello(ip: &str) -> ClientHello {
        ClientHello {
            ip: ip.to_string(),
            ip_version: 4,
            ed25519_pub: [1u8; 32],
            x25519_pub: [2u8; 32],
            client_nonce: [3u8; 32],
        }
    }

    #[test]
    fn client_hello_round_trips() {
        let hello = sample_hello("10.8.0.2");
        let decoded = ClientHello::decode(&hello.encode()).unwrap();
        assert_eq!(decoded.ip, hello.ip);
        assert_eq!(decoded.ed25519_pub, hello.ed25519_pub);
        assert_eq!(decoded.x25519_pub, hello.x25519_pub);
        assert_eq!(decoded.client_nonce, hello.client_nonce);
    }

    #[test]
    fn client_hello_rejects_short_ip() {
        let mut hello = sample_hello("1");
        hello.ip = "1".to_string();
        let buf = hello.encode();
        assert!(ClientHello::decode(&buf).is_err());
    }

    #[test]
    fn client_hello_accepts_ipv6_length_boundary() {
        let ip = "2001:0db8:0000:0000:0000:ff00:0042:832"; // 38 chars, within bound
        let hello = sample_hello(ip);
        assert!(ClientHello::decode(&hello.encode()).is_ok());
    }

    #[test]
    fn server_hello_round_trips() {
        let hello = ServerHello {
            signature: [9u8; 64],
            server_nonce: [8u8; 32],
            x25519_pub: [7u8; 32],
        };
        let decoded = ServerHello::decode(&hello.encode()).unwrap();
        assert_eq!(decoded.signature, hello.signature);
        assert_eq!(decoded.server_nonce, hello.server_nonce);
        assert_eq!(decoded.x25519_pub, hello.x25519_pub);
    }

    #[test]
    fn server_hello_total_length_is_128() {
        let hello = ServerHello {
            signature: [0u8; 64],
            server_nonce: [0u8; 32],
            x25519_pub: [0u8; 32],
        };
        assert_eq!(hello.encode().len(), 128);
    }

    #[test]
    fn client_signature_round_trips() {
        let sig = ClientSignature { signature: [5u8; 64] };
        let decoded = ClientSignature::decode(&sig.encode()).unwrap();
        assert_eq!(decoded.signature, sig.signature);
    }
}
