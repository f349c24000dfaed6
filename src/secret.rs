//! Secret values for generated credential files.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::SECRET_BYTES;

pub trait SecretGenerator {
    /// Returns a fresh hex-encoded secret.
    fn generate(&self) -> String;
}

/// Draws secrets from the operating system's cryptographically secure source.
#[derive(Debug, Clone, Copy)]
pub struct OsSecretGenerator {
    bytes: usize,
}

impl OsSecretGenerator {
    pub fn new() -> Self {
        Self { bytes: SECRET_BYTES }
    }
}

impl Default for OsSecretGenerator {
    fn default() -> Self {
        OsSecretGenerator::new()
    }
}

impl SecretGenerator for OsSecretGenerator {
    fn generate(&self) -> String {
        let mut buf = vec![0u8; self.bytes];
        OsRng.fill_bytes(&mut buf);
        hex::encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_hex_secrets() {
        let generator = OsSecretGenerator::new();
        let first = generator.generate();
        let second = generator.generate();
        assert_eq!(first.len(), SECRET_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
