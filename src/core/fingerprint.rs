// src/core/fingerprint.rs

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Computes the content hash stored in the index for a plan row.
///
/// The hash only lets an operator notice that a plan line changed underneath an
/// existing index; it never invalidates recorded results by itself.
pub fn hash_command(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes());
    let bytes = hash.as_bytes();
    hex::encode(bytes.get(..HASH_TRUNCATE_LENGTH).unwrap_or(bytes))
}
