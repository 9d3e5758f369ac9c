//! Cache manager behaviour under concurrent use.

use std::sync::Arc;
use tenantry_cache::{CacheConfig, CacheKey, CacheManager, PrefixMatch};
use tenantry_config::CacheSettings;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_and_eviction() {
    let manager = Arc::new(CacheManager::new());
    let cache = manager.get_or_create("acme", CacheConfig::new().with_key_index(true));

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    cache.put(CacheKey::get(format!("/w{w}/{i}")), vec![w as u8]);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    assert_eq!(cache.len(), 400);

    let handles: Vec<_> = (0..4)
        .map(|w| manager.evict_by_prefix("acme", &format!("/w{w}")).unwrap())
        .collect();
    let removed: usize = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .sum();

    assert_eq!(removed, 200);
    assert_eq!(cache.len(), 200);
    assert!(cache.get(CacheKey::get("/w5/3")).is_some());
}

#[tokio::test]
async fn settings_drive_cache_shape() {
    let settings = CacheSettings {
        max_entries: 2,
        boundary_prefix_match: false,
        ..CacheSettings::default()
    };
    let manager = CacheManager::new();
    let cache = manager.get_or_create("acme", CacheConfig::from(&settings));

    cache.put(CacheKey::get("/a/b"), vec![1]);
    cache.put(CacheKey::get("/a/bc"), vec![2]);
    cache.put(CacheKey::get("/a/bcd"), vec![3]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.config().prefix_match, PrefixMatch::Raw);

    let removed = manager.evict_by_prefix("acme", "/a/b").unwrap().await.unwrap();
    assert_eq!(removed, 2);
}
