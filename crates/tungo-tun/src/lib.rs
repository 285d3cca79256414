//! tungo-tun - the TUN device collaborator
//!
//! Opens a platform TUN interface and exposes it as `AsyncRead +
//! AsyncWrite` of whole IP packets, for the pump in `tungo-core` to drive.

mod device;
mod error;

pub use device::{TunConfig, TunDevice};
pub use error::TunError;
