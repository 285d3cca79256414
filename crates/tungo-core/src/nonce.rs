//! Deterministic 96-bit nonce counter (C1).
//!
//! Two fields, `low` (u64) and `high` (u32), strictly monotonically
//! increasing for a given direction until wrap. The on-wire and AAD
//! encoding is fixed as `low` (8 bytes big-endian) `|| high` (4 bytes
//! big-endian) — see spec.md §9 open question 2. Do not change this
//! byte order; it is load-bearing for interop.

use crate::error::SessionError;

pub const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Nonce {
    low: u64,
    high: u32,
}

impl Nonce {
    pub fn new() -> Self {
        Self { low: 0, high: 0 }
    }

    /// Advances the counter by one. Mutated only by the owner of the
    /// direction; callers must serialize access themselves.
    pub fn increment(&mut self) -> Result<(), SessionError> {
        if self.low == u64::MAX && self.high == u32::MAX {
            return Err(SessionError::NonceOverflow);
        }
        if self.low == u64::MAX {
            self.high += 1;
            self.low = 0;
        } else {
            self.low += 1;
        }
        Ok(())
    }

    pub fn encode(&self) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[..8].copy_from_slice(&self.low.to_be_bytes());
        out[8..].copy_from_slice(&self.high.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; NONCE_LEN]) -> Self {
        let low = u64::from_be_bytes(bytes[..8].try_into().unwrap());
        let high = u32::from_be_bytes(bytes[8..].try_into().unwrap());
        Self { low, high }
    }

    #[cfg(test)]
    fn from_parts(low: u64, high: u32) -> Self {
        Self { low, high }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let n = Nonce::new();
        assert_eq!(n.encode(), [0u8; 12]);
    }

    #[test]
    fn increment_carries_into_high() {
        let mut n = Nonce::from_parts(u64::MAX, 0);
        n.increment().unwrap();
        assert_eq!(n, Nonce::from_parts(0, 1));
    }

    #[test]
    fn increment_overflow_fails_without_mutation() {
        let mut n = Nonce::from_parts(u64::MAX, u32::MAX);
        let before = n;
        let err = n.increment().unwrap_err();
        assert!(matches!(err, SessionError::NonceOverflow));
        assert_eq!(n, before);
    }

    #[test]
    fn encode_is_low_then_high_big_endian() {
        let n = Nonce::from_parts(1, 2);
        let bytes = n.encode();
        assert_eq!(&bytes[..8], &1u64.to_be_bytes());
        assert_eq!(&bytes[8..], &2u32.to_be_bytes());
    }

    #[test]
    fn decode_is_inverse_of_encode() {
        let n = Nonce::from_parts(0x1122_3344_5566_7788, 0x99aa_bbcc);
        assert_eq!(Nonce::decode(&n.encode()), n);
    }

    proptest::proptest! {
        #[test]
        fn round_trip(low: u64, high: u32) {
            let n = Nonce::from_parts(low, high);
            proptest::prop_assert_eq!(Nonce::decode(&n.encode()), n);
        }
    }
}
