pub mod config;

use std::hash::Hasher;

/// Hash a string using xxHash64 for use as cache keys
pub fn hash_string(s: &str) -> i64 {
    let mut hasher = twox_hash::XxHash64::default();
    hasher.write(s.to_lowercase().as_bytes());
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_case() {
        assert_eq!(hash_string("Plan My Week"), hash_string("plan my week"));
        assert_ne!(hash_string("plan my week"), hash_string("plan my day"));
    }
}
