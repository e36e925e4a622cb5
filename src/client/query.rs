//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存：按键保存条目、判断过期、去重拉取并向订阅者扇出变更。

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::key::QueryKey;
use crate::metrics::QueryMetrics;
use crate::sync::invalidation::{InvalidationBus, Listener, Subscription};
use crate::sync::single_flight::{FetchHandle, RequestDeduplicator};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// 查询条目快照
///
/// `Success` 时 `data` 一定存在且 `error` 为空；`Error` 时 `error` 一定存在，
/// `data` 保留上一次成功的值（如果有）。
#[derive(Debug, Clone)]
pub struct QueryEntry {
    key: QueryKey,
    status: QueryStatus,
    data: Option<Arc<Value>>,
    error: Option<QueryError>,
    /// 上一次成功拉取的时间
    fetched_at: Option<Instant>,
    error_at: Option<Instant>,
    stale_after: Duration,
    /// 被显式失效且尚未重新拉取
    invalidated: bool,
}

impl QueryEntry {
    fn idle(key: QueryKey, stale_after: Duration) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            error_at: None,
            stale_after,
            invalidated: false,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn data(&self) -> Option<&Arc<Value>> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn error_at(&self) -> Option<Instant> {
        self.error_at
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// 是否过期
    ///
    /// 被失效、从未成功、处于错误状态，或距上次成功拉取超过 `stale_after` 时过期。
    pub fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated || self.status == QueryStatus::Error {
            return true;
        }
        match self.fetched_at {
            Some(at) => now.saturating_duration_since(at) > self.stale_after,
            None => true,
        }
    }

    /// 成功且未过期
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Success && !self.is_stale(Instant::now())
    }

    /// 将数据反序列化为具体类型
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.data {
            Some(value) => Ok(Some(T::deserialize(value.as_ref())?)),
            None => Ok(None),
        }
    }

    fn needs_fetch(&self, now: Instant) -> bool {
        match self.status {
            QueryStatus::Idle => true,
            QueryStatus::Loading => false,
            QueryStatus::Success | QueryStatus::Error => self.is_stale(now),
        }
    }
}

/// `begin_fetch` 的判断结果
enum Begin {
    /// 无需拉取
    Fresh(QueryEntry),
    /// 已有进行中的拉取
    Loading,
    /// 已切换为 Loading，需要发起拉取
    Started(QueryEntry),
}

struct QueryCacheInner {
    entries: DashMap<String, QueryEntry>,
    dedup: RequestDeduplicator<Arc<Value>>,
    bus: Arc<InvalidationBus<QueryEntry>>,
    config: QueryConfig,
    metrics: QueryMetrics,
}

/// 查询缓存
///
/// 显式构造、显式持有，克隆开销很小（共享同一份状态）。
/// 条目只通过缓存自身的方法修改，持有条目锁期间不会 await 也不会调用订阅者。
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

/// 查询缓存的弱引用，供订阅回调持有以避免引用环
#[derive(Clone)]
pub struct WeakQueryCache {
    inner: Weak<QueryCacheInner>,
}

impl WeakQueryCache {
    pub fn upgrade(&self) -> Option<QueryCache> {
        self.inner.upgrade().map(|inner| QueryCache { inner })
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.len())
            .field("in_flight", &self.inner.dedup.pending_count())
            .finish()
    }
}

impl QueryCache {
    /// 创建新的查询缓存
    ///
    /// # 参数
    ///
    /// * `config` - 查询缓存配置
    pub fn new(config: QueryConfig) -> Self {
        info!(
            "Initializing QueryCache, default_stale_after_ms={}, families={}",
            config.global.default_stale_after_ms,
            config.families.len()
        );
        Self {
            inner: Arc::new(QueryCacheInner {
                entries: DashMap::new(),
                dedup: RequestDeduplicator::new(),
                bus: InvalidationBus::new(),
                config,
                metrics: QueryMetrics::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakQueryCache {
        WeakQueryCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.inner.metrics
    }

    fn record(&self, key: &QueryKey, op: &str, result: &str) {
        if self.inner.config.global.enable_metrics {
            self.inner.metrics.record(key.family(), op, result);
        }
    }

    /// 获取条目快照
    ///
    /// 不存在时创建 Idle 条目，不会触发拉取。
    pub fn get(&self, key: &QueryKey) -> QueryEntry {
        let stale_after = self.inner.config.stale_after_for(key);
        self.inner
            .entries
            .entry(key.canonical())
            .or_insert_with(|| QueryEntry::idle(key.clone(), stale_after))
            .clone()
    }

    /// 获取条目快照，不存在时返回 None
    pub fn peek(&self, key: &QueryKey) -> Option<QueryEntry> {
        self.inner.entries.get(&key.canonical()).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// 该键是否有进行中的拉取
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.dedup.is_pending(key)
    }

    /// 订阅条目变更
    ///
    /// 回调在该键条目每次变更时被调用，收到的是不可变快照。
    pub fn subscribe<F>(&self, key: &QueryKey, callback: F) -> Subscription
    where
        F: Fn(&QueryEntry) + Send + Sync + 'static,
    {
        let listener: Listener<QueryEntry> = Arc::new(callback);
        self.inner.bus.subscribe(key, listener)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner.bus.subscriber_count(key)
    }

    fn notify(&self, entry: &QueryEntry) {
        let n = self.inner.bus.notify(&entry.key, entry);
        debug!(
            "QueryCache: notified {} subscribers, key={}, status={:?}",
            n, entry.key, entry.status
        );
    }

    /// 决定是否需要拉取，需要时原子地切换为 Loading
    fn begin_fetch(&self, key: &QueryKey, stale_after: Option<Duration>) -> Begin {
        let stale_after = stale_after.unwrap_or_else(|| self.inner.config.stale_after_for(key));
        let now = Instant::now();
        let mut entry = self
            .inner
            .entries
            .entry(key.canonical())
            .or_insert_with(|| QueryEntry::idle(key.clone(), stale_after));
        entry.stale_after = stale_after;

        if entry.status == QueryStatus::Loading {
            return Begin::Loading;
        }
        if !entry.needs_fetch(now) {
            return Begin::Fresh(entry.clone());
        }
        entry.status = QueryStatus::Loading;
        entry.invalidated = false;
        Begin::Started(entry.clone())
    }

    /// 经去重器发起拉取，结算在释放槽位后执行且只执行一次
    ///
    /// 必须在 tokio 运行时内调用。
    fn start_fetch<F, Fut, T>(&self, key: &QueryKey, fetcher: F) -> FetchHandle<Arc<Value>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let cache = self.downgrade();
        let settle_key = key.clone();
        let handle = self.inner.dedup.fetch_once_then(
            key,
            move || async move {
                match fetcher().await {
                    Ok(value) => serde_json::to_value(value)
                        .map(Arc::new)
                        .map_err(QueryError::from),
                    Err(e) => Err(e),
                }
            },
            move |result| {
                if let Some(cache) = cache.upgrade() {
                    cache.settle(&settle_key, result);
                }
            },
        );

        if handle.is_shared() {
            self.record(key, "fetch", "dedup");
        } else {
            // 由后台任务驱动，等待者放弃等待也不会让条目停在 Loading
            tokio::spawn(handle.shared_future());
            self.record(key, "fetch", "start");
        }
        handle
    }

    /// 结算：按完成顺序覆盖条目（后完成者胜出）
    fn settle(&self, key: &QueryKey, result: &Result<Arc<Value>>) {
        let now = Instant::now();
        let snapshot = {
            let mut entry = match self.inner.entries.get_mut(&key.canonical()) {
                Some(entry) => entry,
                None => {
                    debug!("QueryCache: entry cleared before settlement, key={}", key);
                    return;
                }
            };
            match result {
                Ok(data) => {
                    entry.status = QueryStatus::Success;
                    entry.data = Some(data.clone());
                    entry.error = None;
                    entry.fetched_at = Some(now);
                }
                Err(e) => {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(e.clone());
                    entry.error_at = Some(now);
                }
            }
            entry.clone()
        };

        match result {
            Ok(_) => {
                debug!("QueryCache: fetch succeeded, key={}", key);
                self.record(key, "fetch", "success");
            }
            Err(e) => {
                warn!("QueryCache: fetch failed, key={}, error={}", key, e);
                self.record(key, "fetch", "error");
            }
        }
        self.notify(&snapshot);
    }

    /// 确保条目新鲜
    ///
    /// 条目为 Idle 或已过期时，立即切换为 Loading 并在后台发起去重拉取；
    /// 调用方通过订阅观察状态变化，而不是阻塞等待。
    ///
    /// # 参数
    ///
    /// * `key` - 查询键
    /// * `fetcher` - 拉取函数
    /// * `stale_after` - 本次调用的过期时间，None 表示使用键族配置
    ///
    /// # 返回值
    ///
    /// 发起了新的拉取时返回 true
    #[instrument(skip_all, level = "debug", fields(key = %key))]
    pub fn ensure_fresh<F, Fut, T>(
        &self,
        key: &QueryKey,
        fetcher: F,
        stale_after: Option<Duration>,
    ) -> Result<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        key.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| QueryError::Config(format!("ensure_fresh requires a tokio runtime: {}", e)))?;

        match self.begin_fetch(key, stale_after) {
            Begin::Fresh(_) | Begin::Loading => Ok(false),
            Begin::Started(snapshot) => {
                self.notify(&snapshot);
                self.start_fetch(key, fetcher);
                Ok(true)
            }
        }
    }

    /// 拉取并等待结算
    ///
    /// 与 `ensure_fresh` 判断规则相同，但会等待结果；已有进行中的拉取时加入它。
    ///
    /// # 返回值
    ///
    /// 返回结算后的条目快照。拉取失败不会返回 Err，错误记录在条目中。
    #[instrument(skip_all, level = "debug", fields(key = %key))]
    pub async fn fetch<F, Fut, T>(
        &self,
        key: &QueryKey,
        fetcher: F,
        stale_after: Option<Duration>,
    ) -> Result<QueryEntry>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        key.validate()?;
        let handle = match self.begin_fetch(key, stale_after) {
            Begin::Fresh(entry) => return Ok(entry),
            Begin::Loading => self.start_fetch(key, fetcher),
            Begin::Started(snapshot) => {
                self.notify(&snapshot);
                self.start_fetch(key, fetcher)
            }
        };
        // 结果已由结算写入条目，这里只等待结算完成
        handle.await.ok();
        Ok(self.get(key))
    }

    /// 失效
    ///
    /// 标记条目过期并立即通知订阅者，保留已有数据以免界面闪空。
    /// 条目不存在时不做任何事。
    #[instrument(skip_all, level = "debug", fields(key = %key))]
    pub fn invalidate(&self, key: &QueryKey) {
        let snapshot = match self.inner.entries.get_mut(&key.canonical()) {
            Some(mut entry) => {
                entry.invalidated = true;
                entry.clone()
            }
            None => {
                debug!("QueryCache: invalidate on unknown key={}", key);
                return;
            }
        };
        self.record(key, "invalidate", "success");
        self.notify(&snapshot);
    }

    pub fn invalidate_all<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a QueryKey>,
    {
        for key in keys {
            self.invalidate(key);
        }
    }

    /// 清空缓存
    ///
    /// 移除所有条目、进行中的拉取槽位和订阅者。
    pub fn clear(&self) {
        info!(
            "QueryCache: clearing {} entries and {} subscribers",
            self.inner.entries.len(),
            self.inner.bus.total_subscribers()
        );
        self.inner.entries.clear();
        self.inner.dedup.clear();
        self.inner.bus.clear();
    }
}
