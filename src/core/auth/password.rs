//! Password hashing
//!
//! bcrypt digests embed their own salt and cost, so verification needs only
//! the plaintext and the stored digest.

/// Default bcrypt cost factor
pub const DEFAULT_COST: u32 = 10;

/// bcrypt only reads this many bytes of input; longer passwords are refused
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(#[from] bcrypt::BcryptError),
}

/// Salted password hasher
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    /// Create a hasher with an explicit cost (tests use the bcrypt minimum)
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with a fresh random salt.
    /// Passwords over [`MAX_PASSWORD_BYTES`] are an error, never truncated.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::non_truncating_hash(password, self.cost)?)
    }

    /// Verify a password against a stored digest.
    /// A malformed digest or an over-long password is a mismatch, not an error.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        bcrypt::non_truncating_verify(password, digest).unwrap_or(false)
    }
}
