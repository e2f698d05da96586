//! Pickup code protocol.
//!
//! Each rider is assigned a private 4-digit code at session creation. The
//! driver may see the first two digits as a hint; the rider proves identity
//! by supplying the last two. Codes are scoped per rider-in-session, so
//! cross-rider collisions are harmless and not checked for.

use rand::Rng;

/// Length of a pickup code in decimal digits.
pub const CODE_LEN: usize = 4;

/// Digits shown to the driver as a hint.
pub const HINT_LEN: usize = 2;

/// Generates a fresh 4-digit code, zero-padded.
pub fn generate() -> String {
    let n: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("{n:04}")
}

/// The driver-visible half of a code: its first two digits.
pub fn hint(code: &str) -> &str {
    &code[..HINT_LEN]
}

/// Checks a rider-supplied proof (the last two digits) against the code.
///
/// The proof must be exactly two characters; anything else never matches.
pub fn proof_matches(code: &str, last_two: &str) -> bool {
    last_two.len() == CODE_LEN - HINT_LEN && code[HINT_LEN..] == *last_two
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_four_digits() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hint_is_first_two_digits() {
        assert_eq!(hint("0427"), "04");
        assert_eq!(hint("9900"), "99");
    }

    #[test]
    fn test_proof_matches_trailing_digits_only() {
        assert!(proof_matches("0427", "27"));
        assert!(!proof_matches("0427", "04"));
        assert!(!proof_matches("0427", "28"));
        // Wrong lengths never match, including the full code.
        assert!(!proof_matches("0427", "0427"));
        assert!(!proof_matches("0427", "7"));
        assert!(!proof_matches("0427", ""));
    }
}
