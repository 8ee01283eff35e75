//! Address-to-state-key projection: the one keyed hash the state/storage
//! queries use to turn a subscriber's address list into trie state keys
//! (§4.4, §6).

use sha3::{Digest, Keccak256};

/// `state_key_for_address("0xabc…") -> "abc…"` (lowercase hex, no `0x`,
/// matching the 64-char shape the rest of the pipeline uses for a CID's
/// sibling key fields).
pub fn state_key_for_address(address: &str) -> String {
    let trimmed = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(trimmed).unwrap_or_default();
    hex::encode(Keccak256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_address_produces_same_key() {
        let a = state_key_for_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let b = state_key_for_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(a, b);
    }

    #[test]
    fn different_addresses_produce_different_keys() {
        let a = state_key_for_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let b = state_key_for_address("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_64_hex_chars() {
        let key = state_key_for_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(key.len(), 64);
    }
}
