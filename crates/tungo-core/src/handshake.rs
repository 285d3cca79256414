//! Three-message mutual-authentication handshake (C4).
//!
//! Client: `INIT -> SENT_HELLO -> RECEIVED_HELLO -> SENT_SIG -> READY`.
//! Server: `INIT -> RECEIVED_HELLO -> SENT_HELLO -> RECEIVED_SIG -> READY`.
//! Either side moves to `FAILED` (an `Err` return, in this mapping — no
//! retries within one handshake) on any wire, signature, timeout, or I/O
//! error, as spec.md §4.4 requires.

use std::time::Duration;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Public};
use zeroize::Zeroizing;

use crate::error::HandshakeError;
use crate::identity::{verify_with_pubkey, EphemeralClientKey, PinnedServerKey, ServerIdentity};
use crate::messages::{ClientHello, ClientSignature, ServerHello};
use crate::session::Session;

const INFO_CLIENT_TO_SERVER: &[u8] = b"client-to-server";
const INFO_SERVER_TO_CLIENT: &[u8] = b"server-to-client";
const INFO_SESSION_ID: &[u8] = b"session-id-derivation";

const MAX_HANDSHAKE_MESSAGE_BYTES: usize = 4096;

/// Runs the client side of the handshake against `transport`, completing
/// within `deadline` or failing with `HandshakeError::Timeout`.
pub async fn client_handshake<T>(
    transport: &mut T,
    client_ip: &str,
    ip_version: u8,
    pinned_server_key: PinnedServerKey,
    deadline: Duration,
) -> Result<Session, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    timeout(deadline, client_handshake_inner(transport, client_ip, ip_version, pinned_server_key))
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

async fn client_handshake_inner<T>(
    transport: &mut T,
    client_ip: &str,
    ip_version: u8,
    pinned_server_key: PinnedServerKey,
) -> Result<Session, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let ephemeral_ed25519 = EphemeralClientKey::generate();
    let x25519_secret = EphemeralSecret::random_from_rng(rand_core::OsRng);
    let x25519_pub = X25519Public::from(&x25519_secret);
    let client_nonce = Zeroizing::new(random_32());

    let hello = ClientHello {
        ip: client_ip.to_string(),
        ip_version,
        ed25519_pub: ephemeral_ed25519.public_bytes(),
        x25519_pub: *x25519_pub.as_bytes(),
        client_nonce: *client_nonce,
    };
    write_message(transport, &hello.encode()).await?;

    let server_hello_bytes = read_message(transport).await?;
    let server_hello = ServerHello::decode(&server_hello_bytes)?;

    let mut to_verify = Vec::with_capacity(32 + 32 + 32);
    to_verify.extend_from_slice(&server_hello.x25519_pub);
    to_verify.extend_from_slice(&server_hello.server_nonce);
    to_verify.extend_from_slice(&client_nonce);
    pinned_server_key.verify(&to_verify, &server_hello.signature)?;

    let mut to_sign = Vec::with_capacity(32 + 32 + 32);
    to_sign.extend_from_slice(&x25519_pub.to_bytes());
    to_sign.extend_from_slice(&client_nonce);
    to_sign.extend_from_slice(&server_hello.server_nonce);
    let client_signature = ephemeral_ed25519.sign(&to_sign);
    write_message(
        transport,
        &ClientSignature { signature: client_signature }.encode(),
    )
    .await?;

    let server_x25519_pub = X25519Public::from(server_hello.x25519_pub);
    let shared = Zeroizing::new(*x25519_secret.diffie_hellman(&server_x25519_pub).as_bytes());
    let salt = session_salt(&server_hello.server_nonce, &client_nonce);

    let client_to_server_key = derive_key(&shared, &salt, INFO_CLIENT_TO_SERVER);
    let server_to_client_key = derive_key(&shared, &salt, INFO_SERVER_TO_CLIENT);
    let session_id = derive_key(&shared, &salt, INFO_SESSION_ID);

    Ok(Session::new(
        session_id,
        /* is_server = */ false,
        /* send_key = */ client_to_server_key,
        /* recv_key = */ server_to_client_key,
    ))
}

/// Runs the server side of the handshake against `transport`, completing
/// within `deadline` or failing with `HandshakeError::Timeout`.
///
/// Returns the session and the tunnel IP the client asked for in its
/// `ClientHello` (IP *allocation* is out of scope here — the caller decides
/// whether to honor, remap, or reject it).
pub async fn server_handshake<T>(
    transport: &mut T,
    identity: &ServerIdentity,
    deadline: Duration,
) -> Result<(Session, String), HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    timeout(deadline, server_handshake_inner(transport, identity))
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

async fn server_handshake_inner<T>(
    transport: &mut T,
    identity: &ServerIdentity,
) -> Result<(Session, String), HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let client_hello_bytes = read_message(transport).await?;
    let client_hello = ClientHello::decode(&client_hello_bytes)?;

    let x25519_secret = EphemeralSecret::random_from_rng(rand_core::OsRng);
    let x25519_pub = X25519Public::from(&x25519_secret);
    let server_nonce = Zeroizing::new(random_32());

    let mut to_sign = Vec::with_capacity(32 + 32 + 32);
    to_sign.extend_from_slice(x25519_pub.as_bytes());
    to_sign.extend_from_slice(&server_nonce);
    to_sign.extend_from_slice(&client_hello.client_nonce);
    let signature = identity.sign(&to_sign);

    write_message(
        transport,
        &ServerHello {
            signature,
            server_nonce: *server_nonce,
            x25519_pub: *x25519_pub.as_bytes(),
        }
        .encode(),
    )
    .await?;

    let sig_bytes = read_message(transport).await?;
    let client_signature = ClientSignature::decode(&sig_bytes)?;

    let mut client_signed = Vec::with_capacity(32 + 32 + 32);
    client_signed.extend_from_slice(&client_hello.x25519_pub);
    client_signed.extend_from_slice(&client_hello.client_nonce);
    client_signed.extend_from_slice(&server_nonce);
    verify_with_pubkey(&client_hello.ed25519_pub, &client_signed, &client_signature.signature)?;

    let client_x25519_pub = X25519Public::from(client_hello.x25519_pub);
    let shared = Zeroizing::new(*x25519_secret.diffie_hellman(&client_x25519_pub).as_bytes());
    let salt = session_salt(&server_nonce, &client_hello.client_nonce);

    let client_to_server_key = derive_key(&shared, &salt, INFO_CLIENT_TO_SERVER);
    let server_to_client_key = derive_key(&shared, &salt, INFO_SERVER_TO_CLIENT);
    let session_id = derive_key(&shared, &salt, INFO_SESSION_ID);

    let session = Session::new(
        session_id,
        /* is_server = */ true,
        /* send_key = */ server_to_client_key,
        /* recv_key = */ client_to_server_key,
    );

    Ok((session, client_hello.ip))
}

fn session_salt(server_nonce: &[u8; 32], client_nonce: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(server_nonce);
    hasher.update(client_nonce);
    hasher.finalize().into()
}

fn derive_key(shared: &[u8; 32], salt: &[u8; 32], info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32-byte HKDF-SHA256 output is always a valid length");
    okm
}

fn random_32() -> [u8; 32] {
    use rand_core::RngCore;
    let mut out = [0u8; 32];
    rand_core::OsRng.fill_bytes(&mut out);
    out
}

async fn write_message<T: AsyncWrite + Unpin>(transport: &mut T, data: &[u8]) -> Result<(), HandshakeError> {
    transport.write_all(&(data.len() as u32).to_be_bytes()).await?;
    transport.write_all(data).await?;
    transport.flush().await?;
    Ok(())
}

async fn read_message<T: AsyncRead + Unpin>(transport: &mut T) -> Result<Vec<u8>, HandshakeError> {
    let mut len_bytes = [0u8; 4];
    transport.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_HANDSHAKE_MESSAGE_BYTES {
        return Err(HandshakeError::WireFormat(format!(
            "handshake message length {len} exceeds maximum {MAX_HANDSHAKE_MESSAGE_BYTES}"
        )));
    }
    let mut buf = vec![0u8; len];
    transport.read_exact(&mut buf).await?;
    Ok(buf)
}
