//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询观察者：界面消费者声明所需的键和渲染回调，
//! 在挂载时拉取，在条目被失效时重新拉取。

use super::query::{QueryCache, QueryEntry, QueryStatus};
use crate::error::Result;
use crate::key::QueryKey;
use crate::sync::invalidation::Subscription;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 可重复调用的拉取函数
pub type QueryFetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// 将异步闭包包装为 `QueryFetcher`
pub fn fetcher<T, F, Fut>(f: F) -> QueryFetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// 渲染回调收到的视图状态
#[derive(Debug, Clone)]
pub struct QueryView {
    pub status: QueryStatus,
    pub entry: QueryEntry,
    /// 有数据但正在刷新或已过期
    pub refreshing: bool,
}

impl From<&QueryEntry> for QueryView {
    fn from(entry: &QueryEntry) -> Self {
        Self {
            status: entry.status(),
            refreshing: entry.data().is_some() && (entry.is_loading() || entry.is_invalidated()),
            entry: entry.clone(),
        }
    }
}

/// 查询观察者
///
/// drop 即卸载，订阅随之移除。
pub struct QueryObserver {
    key: QueryKey,
    cache: QueryCache,
    subscription: Subscription,
}

impl std::fmt::Debug for QueryObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl QueryObserver {
    /// 挂载观察者
    ///
    /// 先订阅，再用当前快照渲染一次，最后确保条目新鲜。
    /// 失效触发的重新拉取在后台任务中发起，不嵌套在通知内。
    ///
    /// # 参数
    ///
    /// * `cache` - 查询缓存
    /// * `key` - 查询键
    /// * `fetcher` - 拉取函数，失效后会被再次调用
    /// * `stale_after` - 过期时间覆盖
    /// * `render` - 渲染回调
    pub fn mount<T, R>(
        cache: &QueryCache,
        key: QueryKey,
        fetcher: QueryFetcher<T>,
        stale_after: Option<Duration>,
        render: R,
    ) -> Result<Self>
    where
        T: Serialize + Send + 'static,
        R: Fn(&QueryView) + Send + Sync + 'static,
    {
        key.validate()?;
        let render = Arc::new(render);
        let weak = cache.downgrade();
        let refetch_key = key.clone();
        let refetch = fetcher.clone();

        let on_change = render.clone();
        let subscription = cache.subscribe(&key, move |entry: &QueryEntry| {
            on_change(&QueryView::from(entry));
            if entry.is_invalidated() && entry.status() != QueryStatus::Loading {
                // 在本轮通知结束后再发起，其余订阅者先收到这次失效快照
                let runtime = match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => runtime,
                    Err(_) => {
                        warn!(
                            "QueryObserver: no tokio runtime, refetch skipped, key={}",
                            refetch_key
                        );
                        return;
                    }
                };
                let weak = weak.clone();
                let key = refetch_key.clone();
                let f = refetch.clone();
                runtime.spawn(async move {
                    if let Some(cache) = weak.upgrade() {
                        debug!("QueryObserver: refetching invalidated key={}", key);
                        if let Err(e) = cache.ensure_fresh(&key, move || f(), stale_after) {
                            warn!("QueryObserver: refetch failed to start: {}", e);
                        }
                    }
                });
            }
        });

        let observer = Self {
            key: key.clone(),
            cache: cache.clone(),
            subscription,
        };
        let initial = cache.get(&key);
        observer.log_mounted(&initial);
        render(&QueryView::from(&initial));
        cache.ensure_fresh(&key, move || fetcher(), stale_after)?;
        Ok(observer)
    }

    fn log_mounted(&self, entry: &QueryEntry) {
        debug!(
            "QueryObserver: mounted key={}, status={:?}, subscription={}",
            self.key,
            entry.status(),
            self.subscription.id()
        );
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// 当前视图
    pub fn current(&self) -> QueryView {
        QueryView::from(&self.cache.get(&self.key))
    }

    /// 卸载
    pub fn unmount(self) {
        debug!("QueryObserver: unmounting key={}", self.key);
        self.subscription.unsubscribe();
    }
}
