use fleetgate_cache::{CacheConfig, Fingerprint, ResponseCache, ResponseCacheEntry};
use fleetgate_core::InMemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("FleetGate Response Cache Example");
    println!("=================================\n");

    let upstream_calls = Arc::new(AtomicUsize::new(0));
    let cache = ResponseCache::new(
        InMemoryStore::new(),
        CacheConfig::builder().ttl(Duration::from_millis(500)).build(),
    );

    let fingerprint = Fingerprint::compute("key-42", "gpt-4", "{\"messages\":[{\"role\":\"user\",\"content\":\"hi\"}]}");

    println!("Test 1: miss, then populate");
    let calls = Arc::clone(&upstream_calls);
    let (entry, hit) = cache
        .get_or_populate(&fingerprint, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(ResponseCacheEntry::new(200, vec![], b"{\"choices\":[...]}".to_vec(), "inst-1".to_string()))
        })
        .await
        .unwrap();
    println!("  hit={hit}, status={}\n", entry.status);

    println!("Test 2: five concurrent identical requests, one upstream call");
    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache_fp = fingerprint.clone();
        let calls = Arc::clone(&upstream_calls);
        let store = InMemoryStore::new();
        let cache = ResponseCache::new(store, CacheConfig::default());
        handles.push(tokio::spawn(async move {
            cache
                .get_or_populate(&cache_fp, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ResponseCacheEntry::new(200, vec![], b"concurrent".to_vec(), "inst-1".to_string()))
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    println!("  total upstream calls so far: {}\n", upstream_calls.load(Ordering::SeqCst));

    println!("Test 3: TTL expiration");
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(cache.get(&fingerprint).await.unwrap().is_none());
    println!("  entry expired as expected");
}
