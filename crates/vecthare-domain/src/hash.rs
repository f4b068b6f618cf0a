//! Content fingerprinting
//!
//! Chunks are addressed by a 32-bit fingerprint of their searchable text,
//! matching the hash the host application uses for its own vector entries.

/// DJB-style 32-bit rolling hash folded to a non-negative value.
///
/// For each character `c`: `h = ((h << 5) - h) + c`, wrapping at 32 bits;
/// the final value is the absolute value of the signed result. Deterministic
/// across platforms, and stable for text that embeds keyword annotations.
pub fn string_hash(text: &str) -> u32 {
    let mut hash: i32 = 0;
    for c in text.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(string_hash("hello world"), string_hash("hello world"));
        assert_ne!(string_hash("hello world"), string_hash("hello worlds"));
    }

    #[test]
    fn empty_string_hashes_to_zero() {
        assert_eq!(string_hash(""), 0);
    }

    #[test]
    fn unicode_input_is_stable() {
        let a = string_hash("naïve café — résumé");
        let b = string_hash("naïve café — résumé");
        assert_eq!(a, b);
    }

    #[test]
    fn keyword_annotated_text_hashes_as_one_string() {
        let plain = "The fox jumps";
        let annotated = format!("{plain} [KEYWORDS: fox jumps]");
        assert_ne!(string_hash(plain), string_hash(&annotated));
    }
}
