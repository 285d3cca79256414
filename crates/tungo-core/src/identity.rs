//! Long-lived Ed25519 identity material for the handshake (C4).
//!
//! Mirrors the teacher's `openshare_core::keys::Identity` (generate, store,
//! load, fingerprint), split into a server side (holds the signing key) and
//! a client side (pins the server's verifying key) since, unlike the
//! teacher's peer-symmetric P2P identity, TunGo's handshake is asymmetric:
//! only the server signs with a long-lived key.

use std::fs;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use crate::error::HandshakeError;

/// The server's long-lived signing identity.
pub struct ServerIdentity {
    signing_key: SigningKey,
}

impl ServerIdentity {
    /// Generates a new signing key and writes the 32-byte seed to `path`.
    pub fn generate_and_store(path: &Path) -> std::io::Result<Self> {
        let signing_key = SigningKey::generate(&mut OsRng);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, signing_key.to_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!(path = %path.display(), "generated server identity");
        Ok(Self { signing_key })
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = fs::read(path)?;
        let bytes: [u8; 32] = data.as_slice().try_into().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "server identity file must be 32 bytes",
            )
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    pub fn load_or_generate(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::generate_and_store(path)
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key.sign(msg).to_bytes()
    }
}

/// The server's pinned public key, as held by a client.
#[derive(Clone, Copy)]
pub struct PinnedServerKey(pub [u8; 32]);

impl PinnedServerKey {
    pub fn verify(&self, msg: &[u8], signature: &[u8; 64]) -> Result<(), HandshakeError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| HandshakeError::WireFormat("invalid pinned server key".into()))?;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        key.verify(msg, &sig).map_err(|_| HandshakeError::Signature)
    }
}

/// The client's ephemeral Ed25519 key pair, freshly generated per handshake
/// (spec.md §9, open question 3: no client pinning, proof-of-possession
/// only).
pub struct EphemeralClientKey {
    signing_key: SigningKey,
}

impl EphemeralClientKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key.sign(msg).to_bytes()
    }
}

pub fn verify_with_pubkey(
    pubkey: &[u8; 32],
    msg: &[u8],
    signature: &[u8; 64],
) -> Result<(), HandshakeError> {
    let key = VerifyingKey::from_bytes(pubkey)
        .map_err(|_| HandshakeError::WireFormat("invalid ed25519 public key".into()))?;
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    key.verify(msg, &sig).map_err(|_| HandshakeError::Signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn server_identity_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.key");

        let original = ServerIdentity::generate_and_store(&path).unwrap();
        let loaded = ServerIdentity::load(&path).unwrap();
        assert_eq!(original.verifying_key(), loaded.verifying_key());
    }

    #[test]
    fn pinned_key_verifies_server_signature() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.key");
        let server = ServerIdentity::generate_and_store(&path).unwrap();

        let msg = b"x25519_pub || server_nonce || client_nonce";
        let sig = server.sign(msg);

        let pinned = PinnedServerKey(server.verifying_key().to_bytes());
        assert!(pinned.verify(msg, &sig).is_ok());
        assert!(pinned.verify(b"different message", &sig).is_err());
    }

    #[test]
    fn ephemeral_client_key_signature_verifies() {
        let client = EphemeralClientKey::generate();
        let msg = b"x25519_pub || client_nonce || server_nonce";
        let sig = client.sign(msg);
        assert!(verify_with_pubkey(&client.public_bytes(), msg, &sig).is_ok());
    }
}
