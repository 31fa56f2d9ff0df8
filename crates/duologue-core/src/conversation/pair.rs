//! Canonical key for an unordered pair of users.

use sha2::{Digest, Sha256};

use duologue_types::user::UserId;

/// Lowercase hex SHA-256 of the two ids, sorted and joined by a NUL byte.
///
/// The key is the same for `(a, b)` and `(b, a)`. The separator keeps
/// `("ab", "c")` and `("a", "bc")` apart.
pub fn pair_key(a: &UserId, b: &UserId) -> String {
    let (low, high) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(low.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(high.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}
