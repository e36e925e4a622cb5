//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 查询观察者集成测试：挂载拉取、失效重新拉取、卸载

#[path = "../common/mod.rs"]
mod common;

use common::{cache_with_stale_after, setup_logging};
use oxquery::client::{fetcher, QueryFetcher};
use oxquery::{QueryCache, QueryKey, QueryObserver, QueryStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn counting_fetcher(calls: Arc<AtomicUsize>, delay: Duration) -> QueryFetcher<usize> {
    fetcher(move || {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(delay).await;
            Ok(n)
        }
    })
}

/// 等待条目满足条件
async fn wait_for<F: Fn(&QueryCache) -> bool>(cache: &QueryCache, condition: F) -> bool {
    for _ in 0..500 {
        if condition(cache) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    false
}

#[tokio::test(start_paused = true)]
async fn test_mount_fetches_and_renders() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["analytics", "latest"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let rendered = Arc::new(Mutex::new(Vec::new()));

    let r = rendered.clone();
    let observer = QueryObserver::mount(
        &cache,
        key.clone(),
        counting_fetcher(calls.clone(), Duration::from_millis(10)),
        None,
        move |view| r.lock().unwrap().push(view.status),
    )
    .unwrap();

    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *rendered.lock().unwrap(),
        vec![QueryStatus::Idle, QueryStatus::Loading, QueryStatus::Success]
    );
    assert_eq!(observer.current().entry.data_as::<usize>().unwrap(), Some(1));
    assert_eq!(observer.key(), &key);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_triggers_refetch() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let calls = Arc::new(AtomicUsize::new(0));

    let refreshing_seen = Arc::new(Mutex::new(false));
    let r = refreshing_seen.clone();
    let _observer = QueryObserver::mount(
        &cache,
        key.clone(),
        counting_fetcher(calls.clone(), Duration::from_millis(10)),
        None,
        move |view| {
            if view.refreshing {
                *r.lock().unwrap() = true;
            }
        },
    )
    .unwrap();
    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);

    cache.invalidate(&key);

    // 重新拉取在通知结束后发起，此时旧数据仍在
    let entry = cache.get(&key);
    assert!(entry.is_invalidated());
    assert_eq!(entry.data_as::<usize>().unwrap(), Some(1));
    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get(&key).data_as::<usize>().unwrap(), Some(2));
    // 刷新期间旧数据仍然可见
    assert!(*refreshing_seen.lock().unwrap());
}

/// 拉取期间的失效会在结算后再触发一次拉取
#[tokio::test(start_paused = true)]
async fn test_invalidation_during_flight_refetches_after_settle() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["activities"]);
    let calls = Arc::new(AtomicUsize::new(0));

    let _observer = QueryObserver::mount(
        &cache,
        key.clone(),
        counting_fetcher(calls.clone(), Duration::from_millis(50)),
        None,
        |_| {},
    )
    .unwrap();
    assert!(cache.get(&key).is_loading());

    cache.invalidate(&key);
    assert!(cache.get(&key).is_loading());

    assert!(wait_for(&cache, |c| calls.load(Ordering::SeqCst) == 2
        && c.get(&key).status() == QueryStatus::Success)
    .await);
    let entry = cache.get(&key);
    assert!(!entry.is_invalidated());
    assert_eq!(entry.data_as::<usize>().unwrap(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_stops_refetching() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["analytics"]);
    let calls = Arc::new(AtomicUsize::new(0));

    let observer = QueryObserver::mount(
        &cache,
        key.clone(),
        counting_fetcher(calls.clone(), Duration::from_millis(5)),
        None,
        |_| {},
    )
    .unwrap();
    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);
    assert_eq!(cache.subscriber_count(&key), 1);

    observer.unmount();
    assert_eq!(cache.subscriber_count(&key), 0);

    cache.invalidate(&key);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get(&key).is_invalidated());
}

#[tokio::test]
async fn test_two_observers_share_one_fetch() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let f = counting_fetcher(calls.clone(), Duration::from_millis(20));

    let _a = QueryObserver::mount(&cache, key.clone(), f.clone(), None, |_| {}).unwrap();
    let _b = QueryObserver::mount(&cache, key.clone(), f, None, |_| {}).unwrap();

    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.subscriber_count(&key), 2);
}

/// 后登记的订阅者按条目变更的先后顺序收到快照
#[tokio::test(start_paused = true)]
async fn test_later_subscribers_see_snapshots_in_order() {
    setup_logging();

    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["campaigns"]);
    let calls = Arc::new(AtomicUsize::new(0));

    let _observer = QueryObserver::mount(
        &cache,
        key.clone(),
        counting_fetcher(calls.clone(), Duration::from_millis(10)),
        None,
        |_| {},
    )
    .unwrap();
    assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _late = cache.subscribe(&key, move |entry| {
        s.lock()
            .unwrap()
            .push((entry.status(), entry.is_invalidated()));
    });

    cache.invalidate(&key);
    assert!(wait_for(&cache, |c| calls.load(Ordering::SeqCst) == 2
        && c.get(&key).status() == QueryStatus::Success)
    .await);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (QueryStatus::Success, true),
            (QueryStatus::Loading, false),
            (QueryStatus::Success, false),
        ]
    );
}

#[test]
fn test_invalidation_without_runtime_does_not_refetch() {
    setup_logging();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let cache = cache_with_stale_after(60_000);
    let key = QueryKey::from(["activities"]);
    let calls = Arc::new(AtomicUsize::new(0));

    let observer = rt.block_on(async {
        let observer = QueryObserver::mount(
            &cache,
            key.clone(),
            counting_fetcher(calls.clone(), Duration::ZERO),
            None,
            |_| {},
        )
        .unwrap();
        assert!(wait_for(&cache, |c| c.get(&key).status() == QueryStatus::Success).await);
        observer
    });

    // 运行时之外的失效只标记过期
    cache.invalidate(&key);
    assert!(cache.get(&key).is_invalidated());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(observer);
}
