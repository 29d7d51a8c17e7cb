//! Arena and player addresses.
//!
//! Chain arenas are identified by their escrow contract address; arenas and
//! players that only exist off-chain get a synthesized 20-byte address so the
//! rest of the system never branches on provenance.

use primitive_types::H160;
use sha3::{Digest, Keccak256};

/// 20-byte account/contract address.
pub type Address = H160;

/// Parse a `0x`-prefixed (or bare) 40-hex-digit address.
pub fn parse_address(s: &str) -> Option<Address> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    if hex_str.len() != 40 {
        return None;
    }
    let bytes = hex::decode(hex_str).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Lowercase `0x`-prefixed rendering.
pub fn format_address(addr: &Address) -> String {
    format!("{addr:#x}")
}

/// Deterministically synthesize an address for an off-chain arena.
///
/// Derived from the arena name and creation instant so that replaying a
/// creation stream reproduces the same identifiers.
pub fn synthetic_address(name: &str, created_at_ms: u64) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(b"claw-arena/address/v1");
    hasher.update(name.as_bytes());
    hasher.update(created_at_ms.to_be_bytes());
    let digest = hasher.finalize();
    Address::from_slice(&digest[12..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_format() {
        let addr = synthetic_address("Micro Mayhem #1", 1_700_000_000_000);
        let rendered = format_address(&addr);
        assert!(rendered.starts_with("0x"));
        assert_eq!(parse_address(&rendered), Some(addr));
    }

    #[test]
    fn parse_accepts_bare_hex() {
        let addr = synthetic_address("a", 1);
        let bare = format_address(&addr).trim_start_matches("0x").to_string();
        assert_eq!(parse_address(&bare), Some(addr));
    }

    #[test]
    fn parse_rejects_bad_lengths() {
        assert_eq!(parse_address("0x1234"), None);
        assert_eq!(parse_address(""), None);
        assert_eq!(parse_address("0xzz"), None);
    }

    #[test]
    fn synthetic_addresses_are_stable_and_distinct() {
        let a = synthetic_address("Whale Wars #3", 42);
        let b = synthetic_address("Whale Wars #3", 42);
        let c = synthetic_address("Whale Wars #4", 42);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
