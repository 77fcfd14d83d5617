//! Payment confirmation signatures.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 using the
//! merchant key secret and hex-encodes the digest.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// Verifies payment confirmation signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier for the given key secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Compute the hex signature the gateway would send for this pair.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Option<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// True only if `signature` matches exactly.
    #[must_use]
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        self.sign(order_id, payment_id)
            .is_some_and(|expected| constant_time_compare(&expected, signature))
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
