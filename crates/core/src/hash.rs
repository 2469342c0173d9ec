//! Deterministic content hashing for cross-run deduplication.

use sha2::{Digest, Sha256};

/// SHA-256 of `title` and `content`, hex-encoded.
///
/// Must be computed last in the standardisation pipeline (SPEC_FULL §4.5) —
/// anything upstream that can still mutate `title`/`content` must run first.
pub fn content_hash(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    // A separator prevents ("ab", "c") and ("a", "bc") colliding.
    hasher.update(b"\0");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{:02x}", b).expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_yields_identical_hash() {
        let a = content_hash("A Big Idea", "Some body text.");
        let b = content_hash("A Big Idea", "Some body text.");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_yields_different_hash() {
        let a = content_hash("A Big Idea", "Some body text.");
        let b = content_hash("A Big Idea", "A different body.");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let h = content_hash("t", "c");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn separator_prevents_boundary_collision() {
        let a = content_hash("ab", "c");
        let b = content_hash("a", "bc");
        assert_ne!(a, b);
    }
}
