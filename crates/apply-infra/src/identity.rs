//! Opaque identity keys for rate-limit bookkeeping.

use sha2::{Digest, Sha256};

/// Address used when the client address is missing or unreadable.
pub const UNKNOWN_ADDRESS: &str = "0.0.0.0";

const FIELD_SEPARATOR: [u8; 1] = [0x1f];

/// Derives salted SHA-256 identity keys from client addresses.
///
/// Keys are 64 hex characters. Rotating the pepper makes every existing key
/// unreachable, which resets all counters.
#[derive(Clone)]
pub struct IdentityHasher {
    pepper: String,
}

impl IdentityHasher {
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    /// Key for the per-address tier.
    pub fn address_key(&self, address: &str) -> String {
        self.digest(&["address", normalize_address(address)])
    }

    /// Key for the per-address-and-action tier.
    pub fn address_action_key(&self, address: &str, action: &str) -> String {
        self.digest(&["address+action", normalize_address(address), action])
    }

    fn digest(&self, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.as_bytes());
        for part in parts {
            hasher.update(FIELD_SEPARATOR);
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("pepper", &"<redacted>")
            .finish()
    }
}

fn normalize_address(address: &str) -> &str {
    match address.trim() {
        "" => UNKNOWN_ADDRESS,
        trimmed => trimmed,
    }
}
