//! Tests for the session signature cache

use super::*;

fn cache(ttl_secs: u64, capacity: usize) -> SignatureCache {
    SignatureCache::with_limits(std::time::Duration::from_secs(ttl_secs), capacity, 50)
}

fn sig(c: char) -> String {
    c.to_string().repeat(60)
}

#[test]
fn test_put_and_get() {
    let cache = cache(7200, 10);
    assert!(cache.get_and_maybe_invalidate("sid-a", 1).is_none());

    assert!(cache.put("sid-a", &sig('a'), 2, None));
    assert_eq!(cache.get_and_maybe_invalidate("sid-a", 2), Some(sig('a')));
    assert_eq!(cache.get_and_maybe_invalidate("sid-a", 5), Some(sig('a')));
    assert!(cache.get_and_maybe_invalidate("sid-other", 5).is_none());
}

#[test]
fn test_last_write_wins_and_short_signatures_ignored() {
    let cache = cache(7200, 10);
    cache.put("sid-a", &sig('a'), 2, None);
    cache.put("sid-a", &sig('b'), 4, None);
    assert_eq!(cache.get_and_maybe_invalidate("sid-a", 4), Some(sig('b')));

    assert!(!cache.put("sid-a", "short", 6, None));
    assert_eq!(cache.get_and_maybe_invalidate("sid-a", 6), Some(sig('b')));
}

#[test]
fn test_ttl_boundary() {
    let cache = cache(60, 10);
    let t0 = Utc::now();
    cache.put_at("sid-a", &sig('a'), 1, None, t0);

    let at_ttl = t0 + Duration::seconds(60);
    assert_eq!(cache.get_and_maybe_invalidate_at("sid-a", 1, at_ttl), Some(sig('a')));

    let past_ttl = t0 + Duration::seconds(61);
    assert!(cache.get_and_maybe_invalidate_at("sid-a", 1, past_ttl).is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_rewind_clears_entry() {
    let cache = cache(7200, 10);
    cache.put("sid-a", &sig('a'), 6, None);

    // client went back to an earlier turn
    assert!(cache.get_and_maybe_invalidate("sid-a", 3).is_none());
    // and the entry is gone for later turns too
    assert!(cache.get_and_maybe_invalidate("sid-a", 8).is_none());
}

#[test]
fn test_capacity_evicts_expired_then_oldest() {
    let cache = cache(60, 2);
    let t0 = Utc::now();
    cache.put_at("old", &sig('o'), 1, None, t0);
    cache.put_at("mid", &sig('m'), 1, None, t0 + Duration::seconds(50));
    cache.put_at("new", &sig('n'), 1, None, t0 + Duration::seconds(70));

    // "old" expired at t0+70, so nothing live was evicted
    assert_eq!(cache.len(), 2);
    let now = t0 + Duration::seconds(70);
    assert!(cache.get_and_maybe_invalidate_at("old", 1, now).is_none());

    cache.put_at("newest", &sig('x'), 1, None, t0 + Duration::seconds(71));
    assert_eq!(cache.len(), 2);
    let now = t0 + Duration::seconds(71);
    assert!(cache.get_and_maybe_invalidate_at("mid", 1, now).is_none());
    assert_eq!(cache.get_and_maybe_invalidate_at("new", 1, now), Some(sig('n')));
    assert_eq!(cache.get_and_maybe_invalidate_at("newest", 1, now), Some(sig('x')));
}

#[test]
fn test_resolve_key_reuses_account_session() {
    let cache = cache(7200, 10);
    cache.put("sid-first", &sig('a'), 3, Some("acct-1"));

    assert_eq!(cache.resolve_key(Some("acct-1"), "sid-second"), "sid-first");
    assert_eq!(cache.resolve_key(Some("acct-2"), "sid-second"), "sid-second");
    assert_eq!(cache.resolve_key(None, "sid-second"), "sid-second");

    // a live derived key always wins
    cache.put("sid-second", &sig('b'), 1, Some("acct-9"));
    assert_eq!(cache.resolve_key(Some("acct-1"), "sid-second"), "sid-second");
}

#[test]
fn test_resolve_key_ignores_expired_origin() {
    let cache = cache(60, 10);
    let t0 = Utc::now();
    cache.put_at("sid-first", &sig('a'), 3, Some("acct-1"), t0);
    let later = t0 + Duration::seconds(120);
    assert_eq!(cache.resolve_key_at(Some("acct-1"), "sid-second", later), "sid-second");
}

#[test]
fn test_clear() {
    let cache = cache(7200, 10);
    cache.put("sid-a", &sig('a'), 1, Some("acct"));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.resolve_key(Some("acct"), "sid-b"), "sid-b");
}

#[test]
fn test_from_config() {
    let config = SignatureCacheConfig { min_signature_length: 10, ..Default::default() };
    let cache = SignatureCache::new(&config);
    assert_eq!(cache.min_signature_length(), 10);
    assert!(cache.put("k", "0123456789", 1, None));
}
