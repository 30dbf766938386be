//! Session identifiers.
//!
//! ULID-like: a big-endian millisecond timestamp prefix followed by random
//! bits, both hex-encoded, so lexical order and creation order agree —
//! unlike a plain v4 UUID, this lets `SessionRegistry::list` order by id
//! alone with no secondary timestamp comparison.

use rand::RngCore;

/// Generate a new, lexically-sortable session id.
pub fn new_session_id(now_millis: u64) -> String {
    let mut rng = rand::thread_rng();
    let mut rand_bytes = [0u8; 10];
    rng.fill_bytes(&mut rand_bytes);
    format!("{now_millis:012x}{}", hex_encode(&rand_bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_lexically_sortable_by_timestamp() {
        let earlier = new_session_id(1_000);
        let later = new_session_id(2_000);
        assert!(earlier < later);
    }

    #[test]
    fn ids_are_unique_for_same_timestamp() {
        let a = new_session_id(1_000);
        let b = new_session_id(1_000);
        assert_ne!(a, b);
        assert_eq!(a.len(), b.len());
    }
}
