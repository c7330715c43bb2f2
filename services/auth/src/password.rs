//! Password hashing via bcrypt

/// bcrypt cost factor for the signup password-initialization path
pub const SIGNUP_COST: u32 = 12;

/// bcrypt cost factor for the inline config-token path. Historical value,
/// deliberately left different from the signup path.
pub const CONFIG_TOKEN_COST: u32 = 10;

/// Hash a password with bcrypt at the given cost factor
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a stored bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps these tests fast; the production cost
    // constants only change the work factor, not the verify contract.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_is_not_the_plaintext() {
        let hash = hash_password("secret123", TEST_COST).unwrap();
        assert_ne!(hash, "secret123");
    }

    #[test]
    fn hash_verifies_the_original_password() {
        let hash = hash_password("secret123", TEST_COST).unwrap();
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("not-the-password", &hash).unwrap());
    }
}
