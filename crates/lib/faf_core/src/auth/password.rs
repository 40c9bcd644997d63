//! Password hashing via bcrypt, plus the legacy digest mirrored to the chat
//! services database.

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Lowercase hex MD5 of the plaintext, the only format the chat services accept.
pub fn legacy_hash(password: &str) -> String {
    format!("{:x}", md5::compute(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("secret").unwrap();
        assert_ne!(hash, "secret");
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("Secret", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(verify_password("secret", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn legacy_hash_is_md5_hex() {
        assert_eq!(legacy_hash("secret"), "5ebe2294ecd0e0f08eab7690d2a6ee69");
    }
}
