//! Opaque bearer-token generation and lifetimes

use chrono::Duration;
use rand::RngCore;

/// Access tokens are 32 random bytes, hex-encoded
pub const ACCESS_TOKEN_BYTES: usize = 32;
/// Refresh tokens are 48 random bytes, hex-encoded
pub const REFRESH_TOKEN_BYTES: usize = 48;

/// Access tokens live one hour from issuance
pub fn access_token_ttl() -> Duration {
    Duration::hours(1)
}

/// Refresh tokens live 90 days from issuance
pub fn refresh_token_ttl() -> Duration {
    Duration::days(90)
}

/// Generate a cryptographically random opaque token (hex-encoded)
pub fn generate_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_hex_of_the_requested_length() {
        let token = generate_token(ACCESS_TOKEN_BYTES);
        assert_eq!(token.len(), ACCESS_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(
            generate_token(REFRESH_TOKEN_BYTES),
            generate_token(REFRESH_TOKEN_BYTES)
        );
    }
}
