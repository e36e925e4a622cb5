//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 单飞模式集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{cache_with_stale_after, setup_logging, CountingFetcher};
use oxquery::{QueryKey, QueryStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

// 模拟并发请求
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_deduplication() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let fetcher = CountingFetcher::new();

    let concurrency = 10;
    let barrier = Arc::new(Barrier::new(concurrency));
    let mut handles = Vec::new();

    for _ in 0..concurrency {
        let cache = cache.clone();
        let key = key.clone();
        let barrier = barrier.clone();
        let f = fetcher.slow(Duration::from_millis(100));
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            cache.fetch(&key, f, None).await
        }));
    }

    for handle in handles {
        let entry = handle.await.unwrap().unwrap();
        assert_eq!(entry.status(), QueryStatus::Success);
        assert_eq!(entry.data_as::<usize>().unwrap(), Some(1));
    }

    // 拉取函数只被调用一次
    assert_eq!(fetcher.calls(), 1);
    assert!(!cache.is_fetching(&key));
    assert_eq!(cache.metrics().count("campaigns", "fetch", "start"), 1);
    assert_eq!(cache.metrics().count("campaigns", "fetch", "success"), 1);
}

#[tokio::test]
async fn test_ensure_fresh_starts_only_one_fetch() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["analytics", "latest"]);
    let fetcher = CountingFetcher::new();

    let started: Vec<bool> = (0..5)
        .map(|_| {
            cache
                .ensure_fresh(&key, fetcher.slow(Duration::from_millis(20)), None)
                .unwrap()
        })
        .collect();

    assert_eq!(started, vec![true, false, false, false, false]);
    assert_eq!(cache.get(&key).status(), QueryStatus::Loading);

    // 加入进行中的拉取，而不是发起新的拉取
    let entry = cache.fetch(&key, fetcher.ok(), None).await.unwrap();
    assert_eq!(entry.status(), QueryStatus::Success);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_distinct_keys_fetch_independently() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let fetcher = CountingFetcher::new();
    let a = QueryKey::from(["analytics"]);
    let b = QueryKey::from(["analytics", "latest"]);

    let (ea, eb) = tokio::join!(
        cache.fetch(&a, fetcher.slow(Duration::from_millis(10)), None),
        cache.fetch(&b, fetcher.slow(Duration::from_millis(10)), None)
    );

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(ea.unwrap().status(), QueryStatus::Success);
    assert_eq!(eb.unwrap().status(), QueryStatus::Success);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached_in_flight() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["activities"]);
    let fetcher = CountingFetcher::new();

    let failed = cache.fetch(&key, fetcher.failing("connection reset"), None).await.unwrap();
    assert_eq!(failed.status(), QueryStatus::Error);
    assert!(!cache.is_fetching(&key));

    // 失败的条目视为过期，下一次拉取会真正重试
    let retried = cache.fetch(&key, fetcher.ok(), None).await.unwrap();
    assert_eq!(retried.status(), QueryStatus::Success);
    assert_eq!(retried.data_as::<usize>().unwrap(), Some(2));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_fresh_entry_skips_fetcher() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let fetcher = CountingFetcher::new();

    cache.fetch(&key, fetcher.ok(), None).await.unwrap();
    let again = cache.fetch(&key, fetcher.ok(), None).await.unwrap();

    assert_eq!(again.data_as::<usize>().unwrap(), Some(1));
    assert_eq!(fetcher.calls(), 1);
    assert!(!cache.ensure_fresh(&key, fetcher.ok(), None).unwrap());
}

/// 等待者超时放弃后，拉取仍在后台完成并结算
#[tokio::test(start_paused = true)]
async fn test_abandoned_fetch_still_settles() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let fetcher = CountingFetcher::new();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(5),
        cache.fetch(&key, fetcher.slow(Duration::from_millis(50)), None),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(cache.get(&key).status(), QueryStatus::Loading);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let entry = cache.get(&key);
    assert_eq!(entry.status(), QueryStatus::Success);
    assert_eq!(entry.data_as::<usize>().unwrap(), Some(1));
    assert!(!cache.is_fetching(&key));
    assert_eq!(fetcher.calls(), 1);

    // 之后的失效和刷新照常工作
    cache.invalidate(&key);
    assert!(cache.ensure_fresh(&key, fetcher.ok(), None).unwrap());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(cache.get(&key).data_as::<usize>().unwrap(), Some(2));
}
