use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys;

const MIN_REPLAY_WINDOW_SIZE: u32 = 1024;
const DEFAULT_DIAL_TIMEOUT_MS: u64 = 5_000;
const MAX_DIAL_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_MAX_PACKET_BYTES: u32 = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Udp,
}

fn default_replay_window_size() -> u32 {
    MIN_REPLAY_WINDOW_SIZE
}

fn default_dial_timeout_ms() -> u64 {
    DEFAULT_DIAL_TIMEOUT_MS
}

fn default_max_packet_bytes() -> u32 {
    DEFAULT_MAX_PACKET_BYTES
}

fn clamp_replay_window_size(value: u32) -> u32 {
    value.max(MIN_REPLAY_WINDOW_SIZE)
}

/// Resets to the 5s default if the configured value is zero or exceeds
/// 300s, as spec.md §6 requires.
fn clamp_dial_timeout_ms(value: u64) -> u64 {
    if value == 0 || value > MAX_DIAL_TIMEOUT_MS {
        DEFAULT_DIAL_TIMEOUT_MS
    } else {
        value
    }
}

#[derive(Debug, Deserialize)]
struct RawClientConfig {
    transport: TransportKind,
    server_addr: String,
    #[serde(default)]
    tunnel_ip: Option<String>,
    server_ed25519_public_key_path: PathBuf,
    #[serde(default = "default_replay_window_size")]
    replay_window_size: u32,
    #[serde(default = "default_dial_timeout_ms")]
    dial_timeout_ms: u64,
    #[serde(default = "default_max_packet_bytes")]
    max_packet_bytes: u32,
}

/// Fully resolved client configuration: defaults filled, clamps applied,
/// and the server's pinned Ed25519 public key already loaded from disk.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportKind,
    pub server_addr: String,
    pub tunnel_ip: Option<String>,
    pub server_public_key: [u8; 32],
    pub replay_window_size: u32,
    pub dial_timeout_ms: u64,
    pub max_packet_bytes: u32,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawClientConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            transport: raw.transport,
            server_addr: raw.server_addr,
            tunnel_ip: raw.tunnel_ip,
            server_public_key: keys::load_32(&raw.server_ed25519_public_key_path)?,
            replay_window_size: clamp_replay_window_size(raw.replay_window_size),
            dial_timeout_ms: clamp_dial_timeout_ms(raw.dial_timeout_ms),
            max_packet_bytes: raw.max_packet_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    transport: TransportKind,
    listen_addr: String,
    server_ed25519_private_key_path: PathBuf,
    #[serde(default)]
    nat_subnet: Option<String>,
    #[serde(default = "default_replay_window_size")]
    replay_window_size: u32,
    #[serde(default = "default_dial_timeout_ms")]
    dial_timeout_ms: u64,
    #[serde(default = "default_max_packet_bytes")]
    max_packet_bytes: u32,
}

/// Fully resolved server configuration. Loads the signing key's 32-byte
/// seed eagerly, the same way `ClientConfig` loads the pinned public key.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub listen_addr: String,
    pub identity_key_path: PathBuf,
    pub nat_subnet: Option<String>,
    pub replay_window_size: u32,
    pub dial_timeout_ms: u64,
    pub max_packet_bytes: u32,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawServerConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawServerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            transport: raw.transport,
            listen_addr: raw.listen_addr,
            identity_key_path: raw.server_ed25519_private_key_path,
            nat_subnet: raw.nat_subnet,
            replay_window_size: clamp_replay_window_size(raw.replay_window_size),
            dial_timeout_ms: clamp_dial_timeout_ms(raw.dial_timeout_ms),
            max_packet_bytes: raw.max_packet_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_pubkey(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("server.pub");
        std::fs::write(&path, [3u8; 32]).unwrap();
        path
    }

    #[test]
    fn replay_window_below_floor_is_raised() {
        assert_eq!(clamp_replay_window_size(4), MIN_REPLAY_WINDOW_SIZE);
        assert_eq!(clamp_replay_window_size(5000), 5000);
    }

    #[test]
    fn dial_timeout_out_of_range_resets_to_default() {
        assert_eq!(clamp_dial_timeout_ms(0), DEFAULT_DIAL_TIMEOUT_MS);
        assert_eq!(clamp_dial_timeout_ms(MAX_DIAL_TIMEOUT_MS + 1), DEFAULT_DIAL_TIMEOUT_MS);
        assert_eq!(clamp_dial_timeout_ms(10_000), 10_000);
    }

    #[test]
    fn client_config_loads_and_clamps() {
        let dir = TempDir::new().unwrap();
        let key_path = write_pubkey(&dir);
        let config_path = dir.path().join("client.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
                transport = "tcp"
                server_addr = "198.51.100.1:4443"
                tunnel_ip = "10.8.0.2"
                server_ed25519_public_key_path = "{}"
                replay_window_size = 4
                dial_timeout_ms = 0
                "#,
                key_path.display()
            ),
        )
        .unwrap();

        let config = ClientConfig::load(&config_path).unwrap();
        assert_eq!(config.transport, TransportKind::Tcp);
        assert_eq!(config.server_public_key, [3u8; 32]);
        assert_eq!(config.replay_window_size, MIN_REPLAY_WINDOW_SIZE);
        assert_eq!(config.dial_timeout_ms, DEFAULT_DIAL_TIMEOUT_MS);
        assert_eq!(config.max_packet_bytes, DEFAULT_MAX_PACKET_BYTES);
    }

    #[test]
    fn server_config_loads_with_defaults() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("server.key");
        std::fs::write(&key_path, [1u8; 32]).unwrap();
        let config_path = dir.path().join("server.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
                transport = "udp"
                listen_addr = "0.0.0.0:4443"
                server_ed25519_private_key_path = "{}"
                nat_subnet = "10.8.0.0/24"
                "#,
                key_path.display()
            ),
        )
        .unwrap();

        let config = ServerConfig::load(&config_path).unwrap();
        assert_eq!(config.transport, TransportKind::Udp);
        assert_eq!(config.replay_window_size, MIN_REPLAY_WINDOW_SIZE);
        assert_eq!(config.dial_timeout_ms, DEFAULT_DIAL_TIMEOUT_MS);
        assert_eq!(config.nat_subnet.as_deref(), Some("10.8.0.0/24"));
    }
}
