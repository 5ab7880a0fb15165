//! Cryptographic Utilities
//!
//! Binary fields of the credential ceremony (challenge, credential id,
//! attestation/assertion components) travel as standard Base64 text.
//! Decoding must exactly invert encoding.

use base64::{Engine, engine::general_purpose};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Short hex digest (first 8 bytes of SHA-256) for log fields
///
/// Lets a challenge be correlated across log lines without writing the
/// challenge itself.
pub fn short_digest(data: &[u8]) -> String {
    sha256(data)[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Encode bytes as base64
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 to bytes
///
/// Accepts the URL-safe alphabet too, since some authenticator bindings
/// report credential ids that way.
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    match general_purpose::STANDARD.decode(s) {
        Ok(bytes) => Ok(bytes),
        Err(standard_err) => general_purpose::URL_SAFE_NO_PAD
            .decode(s.trim_end_matches('='))
            .map_err(|_| standard_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        // SHA-256 of empty string
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_short_digest() {
        assert_eq!(short_digest(b""), "e3b0c44298fc1c14");
        assert_eq!(short_digest(b"hello"), "2cf24dba5fb0a30e");
    }

    #[test]
    fn test_base64_roundtrip_binary() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = to_base64(&data);
        assert_eq!(from_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_accepts_url_safe() {
        // 0xfb 0xff encodes to "+/8=" standard, "-_8" url-safe
        assert_eq!(from_base64("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(from_base64("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(from_base64("not base64 !!").is_err());
    }
}
