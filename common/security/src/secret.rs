use subtle::ConstantTimeEq;

/// Compares a caller-provided secret against the expected one in constant time.
///
/// Only lengths leak: a length mismatch fails without touching the content, and an
/// empty expected secret never matches.
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if expected.is_empty() {
        return false;
    }
    provided.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_secrets_match() {
        assert!(constant_time_eq(b"open-sesame", b"open-sesame"));
    }

    #[test]
    fn last_byte_difference_is_rejected() {
        assert!(!constant_time_eq(b"open-sesame", b"open-sesamf"));
    }

    #[test]
    fn first_byte_difference_is_rejected() {
        assert!(!constant_time_eq(b"open-sesame", b"Open-sesame"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(!constant_time_eq(b"open", b"open-sesame"));
        assert!(!constant_time_eq(b"open-sesame!", b"open-sesame"));
    }

    #[test]
    fn repeated_prefix_is_not_a_match() {
        assert!(!constant_time_eq(b"abab", b"ab"));
    }

    #[test]
    fn empty_inputs() {
        assert!(!constant_time_eq(b"", b"secret"));
        assert!(!constant_time_eq(b"secret", b""));
        assert!(!constant_time_eq(b"", b""));
    }
}
