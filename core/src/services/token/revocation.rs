//! In-process fast-reject index over revoked access tokens.
//!
//! A hit proves revocation. A miss proves nothing: the entry may have been
//! revoked by another process, or before this process started. Token
//! validation must still consult the durable store after a miss.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

type TokenDigest = [u8; 32];

/// Set of SHA-256 digests of revoked tokens. Raw tokens are never stored.
#[derive(Debug, Default)]
pub struct RevocationCache {
    digests: RwLock<HashSet<TokenDigest>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `token` as revoked. Returns `false` if it was already present.
    pub fn add(&self, token: &str) -> bool {
        let digest = digest(token);
        self.digests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(digest)
    }

    /// Whether `token` was revoked on this process since it started
    pub fn check(&self, token: &str) -> bool {
        let digest = digest(token);
        self.digests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&digest)
    }

    pub fn len(&self) -> usize {
        self.digests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn digest(token: &str) -> TokenDigest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(token.as_bytes()));
    out
}

/// Short, non-reversible identifier of a token for log lines
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(&digest(token)[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_then_check() {
        let cache = RevocationCache::new();
        assert!(!cache.check("token-a"));

        assert!(cache.add("token-a"));
        assert!(!cache.add("token-a"));

        assert!(cache.check("token-a"));
        assert!(!cache.check("token-b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(token_fingerprint("abc"), token_fingerprint("abc"));
        assert_ne!(token_fingerprint("abc"), token_fingerprint("abd"));
        assert_eq!(token_fingerprint("abc").len(), 12);
        assert!(!token_fingerprint("secret-token").contains("secret"));
    }

    #[test]
    fn test_concurrent_inserts_and_reads() {
        let cache = Arc::new(RevocationCache::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let token = format!("token-{worker}-{i}");
                        cache.add(&token);
                        assert!(cache.check(&token));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
