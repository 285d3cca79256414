use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunError {
    #[error("failed to parse tunnel address {0:?}: {1}")]
    InvalidAddress(String, std::net::AddrParseError),

    #[error("failed to open TUN device: {0}")]
    Open(#[from] tun::Error),

    #[error("TUN device I/O error: {0}")]
    Io(#[from] std::io::Error),
}
