use rand::Rng;

use crate::config::JOIN_CODE_LENGTH;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random join code of uppercase letters and digits.
///
/// Uniqueness is not guaranteed here; callers check against stored codes.
pub fn generate_join_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are entered by hand; compare them trimmed and uppercased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
