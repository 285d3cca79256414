use thiserror::Error;

/// Errors produced while running the three-message mutual-auth handshake.
///
/// Any variant is fatal to the handshake attempt; no partial session is ever
/// handed back to the caller.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("malformed or truncated handshake message: {0}")]
    WireFormat(String),

    #[error("ed25519 signature verification failed")]
    Signature,

    #[error("handshake deadline elapsed")]
    Timeout,

    #[error("transport I/O error during handshake: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the AEAD session (C5) while encrypting or decrypting
/// one packet.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("AEAD open/seal failed")]
    Decrypt,

    #[error("nonce counter reached 2^96-1, connection must be re-handshaked")]
    NonceOverflow,

    #[error("replay window rejected a duplicate nonce")]
    NonUniqueNonce,
}

/// Errors produced by the wire framing layer (C6/C7).
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("TCP length prefix {0} out of range (16, {1}]")]
    InvalidLength(u32, u32),

    #[error("UDP datagram shorter than the minimum nonce+tag size")]
    MalformedDatagram,

    #[error("I/O error while framing: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error returned by the tunnel pump (C8); wraps the lower-level
/// taxonomies so a single `?` chain can propagate any of them.
#[derive(Error, Debug)]
pub enum PumpError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error("TUN device I/O error: {0}")]
    Tun(std::io::Error),

    #[error("transport I/O error: {0}")]
    Transport(std::io::Error),

    #[error("pump cancelled")]
    Cancelled,
}
