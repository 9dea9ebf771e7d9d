//! Per-domain SPF policy cache.

use std::collections::HashMap;
use std::sync::Mutex;

/// Maps a normalized domain to its extracted SPF policy string.
///
/// Entries live until [`clear`](PolicyCache::clear): no TTL, no size
/// bound. Long-running processes validating many unique domains should
/// clear periodically.
#[derive(Debug, Default)]
pub(crate) struct PolicyCache {
    entries: Mutex<HashMap<String, String>>,
}

impl PolicyCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, domain: &str) -> Option<String> {
        self.entries.lock().unwrap().get(domain).cloned()
    }

    pub(crate) fn put(&self, domain: &str, policy: String) {
        self.entries.lock().unwrap().insert(domain.to_string(), policy);
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_miss_then_hit() {
        let cache = PolicyCache::new();
        assert_eq!(cache.get("example.com"), None);

        cache.put("example.com", "v=spf1 -all".to_string());
        assert_eq!(cache.get("example.com"), Some("v=spf1 -all".to_string()));
    }

    #[test]
    fn put_overwrites() {
        let cache = PolicyCache::new();
        cache.put("example.com", "v=spf1 -all".to_string());
        cache.put("example.com", "v=spf1 ip4:10.0.0.0/8".to_string());
        assert_eq!(
            cache.get("example.com"),
            Some("v=spf1 ip4:10.0.0.0/8".to_string())
        );
    }

    #[test]
    fn clear_empties_everything() {
        let cache = PolicyCache::new();
        cache.put("a.example", "v=spf1 -all".to_string());
        cache.put("b.example", "v=spf1 -all".to_string());

        cache.clear();
        assert_eq!(cache.get("a.example"), None);
        assert_eq!(cache.get("b.example"), None);
    }
}
