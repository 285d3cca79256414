//! tungo-core - TunGo cryptographic session layer
//!
//! Implements the handshake, AEAD session, replay protection, and wire
//! framing that sit between a TUN device and an encrypted transport:
//! nonces (C1), the replay window (C2), handshake wire messages (C3), the
//! handshake state machine (C4), per-direction AEAD sessions (C5), TCP/UDP
//! framing (C6/C7), and the tunnel pump (C8).

pub mod error;
pub mod framing;
pub mod handshake;
pub mod identity;
pub mod messages;
pub mod nonce;
pub mod pump;
pub mod replay;
pub mod session;

// Re-export commonly used types
pub use error::{FramingError, HandshakeError, PumpError, SessionError};
pub use handshake::{client_handshake, server_handshake};
pub use identity::{EphemeralClientKey, PinnedServerKey, ServerIdentity};
pub use pump::{run_tcp_pump, run_udp_pump, UdpTransport};
pub use session::{Session, TcpSession, UdpSession};
