//! Identity cache.
//!
//! Maps account handles to the one shared [`Identity`] per handle. The cache
//! lives as long as its session and never evicts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::json::JsonExt;
use crate::lock::{read, write};
use crate::models::Identity;

#[derive(Debug, Default)]
struct Entries {
    own: Arc<Identity>,
    others: HashMap<String, Arc<Identity>>,
}

impl Entries {
    fn own_if(&self, acct: &str) -> Option<Arc<Identity>> {
        (!acct.is_empty() && self.own.acct() == acct).then(|| Arc::clone(&self.own))
    }

    fn get(&self, acct: &str) -> Option<Arc<Identity>> {
        self.own_if(acct).or_else(|| self.others.get(acct).cloned())
    }
}

/// Session-scoped canonicalization table for identities.
///
/// Our own identity and everybody else's share one lock, so a lookup can
/// never race a promotion to the own identity.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: RwLock<Entries>,
}

impl IdentityCache {
    /// Create an empty cache with a blank own identity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity for `acct`, created from `json` on first sight.
    ///
    /// A hit returns the existing identity untouched; `json` is ignored.
    /// Use [`refresh`](Self::refresh) to apply fresher data.
    pub fn lookup(&self, acct: &str, json: &Value) -> Arc<Identity> {
        if let Some(hit) = read(&self.entries).get(acct) {
            return hit;
        }

        let mut entries = write(&self.entries);
        if let Some(own) = entries.own_if(acct) {
            return own;
        }
        Arc::clone(entries.others.entry(acct.to_string()).or_insert_with(|| {
            tracing::trace!("caching identity {acct}");
            Arc::new(Identity::from_json(json))
        }))
    }

    /// The identity for `acct`, if already known. Never creates one.
    pub fn cached(&self, acct: &str) -> Option<Arc<Identity>> {
        read(&self.entries).get(acct)
    }

    /// Whether `acct` is known
    pub fn contains(&self, acct: &str) -> bool {
        self.cached(acct).is_some()
    }

    /// Look up (or create) the identity for `json["acct"]` and overwrite its
    /// fields from `json`
    pub fn refresh(&self, json: &Value) -> Arc<Identity> {
        let acct = json.str_at("acct");
        let mut entries = write(&self.entries);

        if let Some(identity) = entries.get(&acct) {
            identity.update_from_json(json);
            return identity;
        }
        Arc::clone(
            entries
                .others
                .entry(acct)
                .or_insert_with(|| Arc::new(Identity::from_json(json))),
        )
    }

    /// Our own identity
    pub fn own(&self) -> Arc<Identity> {
        Arc::clone(&read(&self.entries).own)
    }

    /// Overwrite our own identity from `json` (verify_credentials).
    ///
    /// If the handle was already cached as somebody else's identity, that
    /// instance is promoted to be the own identity so existing holders keep
    /// seeing the same object.
    pub fn refresh_own(&self, json: &Value) -> Arc<Identity> {
        let acct = json.str_at("acct");
        let mut entries = write(&self.entries);

        if let Some(existing) = entries.others.remove(&acct) {
            entries.own = existing;
        }
        entries.own.update_from_json(json);
        Arc::clone(&entries.own)
    }

    /// Number of cached identities, excluding our own
    pub fn len(&self) -> usize {
        read(&self.entries).others.len()
    }

    /// Whether no other identity has been cached yet
    pub fn is_empty(&self) -> bool {
        read(&self.entries).others.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_returns_same_instance() {
        let cache = IdentityCache::new();
        let a = cache.lookup("alice", &json!({"acct": "alice", "display_name": "Alice"}));
        let b = cache.lookup("alice", &json!({"acct": "alice", "display_name": "Changed"}));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.display_name(), "Alice");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_does_not_create() {
        let cache = IdentityCache::new();
        assert!(cache.cached("bob").is_none());
        assert!(cache.is_empty());

        cache.lookup("bob", &json!({"acct": "bob"}));
        assert!(cache.contains("bob"));
    }

    #[test]
    fn test_refresh_updates_in_place() {
        let cache = IdentityCache::new();
        let a = cache.lookup("alice", &json!({"acct": "alice", "display_name": "Alice"}));
        let b = cache.refresh(&json!({"acct": "alice", "display_name": "Alice B."}));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.display_name(), "Alice B.");
    }

    #[test]
    fn test_own_identity_checked_first() {
        let cache = IdentityCache::new();
        let own = cache.refresh_own(&json!({"acct": "me", "username": "me"}));

        let looked_up = cache.lookup("me", &json!({"acct": "me"}));
        assert!(Arc::ptr_eq(&own, &looked_up));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_blank_own_never_matches() {
        let cache = IdentityCache::new();
        let stranger = cache.lookup("", &json!({}));
        assert!(!Arc::ptr_eq(&stranger, &cache.own()));
    }

    #[test]
    fn test_refresh_own_promotes_cached() {
        let cache = IdentityCache::new();
        let seen = cache.lookup("me", &json!({"acct": "me"}));

        let own = cache.refresh_own(&json!({"acct": "me", "display_name": "Me"}));
        assert!(Arc::ptr_eq(&seen, &own));
        assert_eq!(seen.display_name(), "Me");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_lookup_and_promotion_share_identity() {
        for _ in 0..500 {
            let cache = Arc::new(IdentityCache::new());

            let promoter = {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.refresh_own(&json!({"acct": "me", "display_name": "Me"})))
            };
            let reader = {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.lookup("me", &json!({"acct": "me"})))
            };

            promoter.join().unwrap();
            let seen = reader.join().unwrap();
            assert!(Arc::ptr_eq(&seen, &cache.own()));
            assert!(Arc::ptr_eq(&cache.lookup("me", &json!({})), &cache.own()));
        }
    }
}
