//! Loads Ed25519 key material from disk, accepting either a 64-character
//! hex string or a raw 32-byte file — whichever `tungo keygen` or an
//! operator's existing key happens to be in.

use std::path::Path;

use crate::error::ConfigError;

pub fn load_32(path: &Path) -> Result<[u8; 32], ConfigError> {
    let data = std::fs::read(path).map_err(|source| ConfigError::KeyRead {
        path: path.display().to_string(),
        source,
    })?;
    decode_32(path, &data)
}

fn decode_32(path: &Path, data: &[u8]) -> Result<[u8; 32], ConfigError> {
    let trimmed = std::str::from_utf8(data)
        .map(str::trim)
        .unwrap_or_default();

    if trimmed.len() == 64 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        let mut out = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut out).map_err(|source| ConfigError::KeyHex {
            path: path.display().to_string(),
            source,
        })?;
        return Ok(out);
    }

    data.try_into().map_err(|_| ConfigError::KeyLength {
        path: path.display().to_string(),
        expected: 32,
        actual: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_raw_32_byte_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key.bin");
        std::fs::write(&path, [7u8; 32]).unwrap();
        assert_eq!(load_32(&path).unwrap(), [7u8; 32]);
    }

    #[test]
    fn loads_hex_encoded_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key.hex");
        std::fs::write(&path, hex::encode([9u8; 32])).unwrap();
        assert_eq!(load_32(&path).unwrap(), [9u8; 32]);
    }

    #[test]
    fn rejects_wrong_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key.bin");
        std::fs::write(&path, [1u8; 16]).unwrap();
        assert!(matches!(load_32(&path), Err(ConfigError::KeyLength { .. })));
    }
}
