use thiserror::Error;

/// Errors produced while loading or validating a `ClientConfig`/`ServerConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read key file {path}: {source}")]
    KeyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key material at {path} has invalid length: expected {expected} bytes, got {actual}")]
    KeyLength {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid hex in key material at {path}: {source}")]
    KeyHex {
        path: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("unknown transport kind {0:?}, expected \"tcp\" or \"udp\"")]
    UnknownTransport(String),
}
