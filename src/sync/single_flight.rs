//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求去重器（单飞模式），保证每个键同一时刻最多只有一个进行中的拉取。

use crate::error::Result;
use crate::key::QueryKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// 所有等待者共享的拉取结果
pub type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

/// 进行中的拉取
struct InFlight<T: Clone> {
    /// 拉取编号，用于结算时只移除自己的槽位
    id: u64,
    future: SharedFetch<T>,
}

/// 拉取句柄
///
/// 可直接 `.await`，所有句柄观察到同一个终态结果。
pub struct FetchHandle<T: Clone> {
    future: SharedFetch<T>,
    shared: bool,
}

impl<T: Clone> FetchHandle<T> {
    /// 是否加入了已有的拉取（而非新发起）
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// 底层共享 future 的副本，可交给后台任务独立驱动
    pub fn shared_future(&self) -> SharedFetch<T> {
        self.future.clone()
    }
}

impl<T: Clone> Future for FetchHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.future).poll(cx)
    }
}

/// 请求去重器
///
/// 对同一规范键的并发请求只调用一次拉取函数，所有调用者共享结果。
/// 结算（成功或失败）时先释放槽位再唤醒等待者，失败不会被永久缓存。
pub struct RequestDeduplicator<T: Clone> {
    /// 正在处理的拉取任务
    in_flight: Arc<DashMap<String, InFlight<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for RequestDeduplicator<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 拉取一次
    ///
    /// 如果该键已有进行中的拉取，返回指向它的句柄，`fetcher` 不会被调用；
    /// 否则登记一次新的拉取。拉取是惰性的，由任意一个句柄驱动。
    ///
    /// # 参数
    ///
    /// * `key` - 查询键
    /// * `fetcher` - 拉取函数
    pub fn fetch_once<F, Fut>(&self, key: &QueryKey, fetcher: F) -> FetchHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.fetch_once_then(key, fetcher, |_| {})
    }

    /// 拉取一次，并在释放槽位之后、唤醒等待者之前执行 `on_settle`
    ///
    /// `on_settle` 只在新发起的拉取上执行一次；加入已有拉取时被丢弃。
    /// 槽位此时已释放，因此 `on_settle` 内部再次发起的拉取不会加入正在结束的这一次。
    pub fn fetch_once_then<F, Fut, S>(&self, key: &QueryKey, fetcher: F, on_settle: S) -> FetchHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        S: FnOnce(&Result<T>) + Send + 'static,
    {
        let canonical = key.canonical();
        match self.in_flight.entry(canonical.clone()) {
            Entry::Occupied(occupied) => {
                debug!("single_flight: joining in-flight fetch, key={}", canonical);
                FetchHandle {
                    future: occupied.get().future.clone(),
                    shared: true,
                }
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let in_flight = self.in_flight.clone();
                let slot_key = canonical.clone();

                let future = async move {
                    let result = fetcher().await;
                    in_flight.remove_if(&slot_key, |_, f| f.id == id);
                    debug!(
                        "single_flight: fetch settled, key={}, ok={}",
                        slot_key,
                        result.is_ok()
                    );
                    on_settle(&result);
                    result
                }
                .boxed()
                .shared();

                vacant.insert(InFlight {
                    id,
                    future: future.clone(),
                });
                debug!("single_flight: started fetch, key={}", canonical);
                FetchHandle {
                    future,
                    shared: false,
                }
            }
        }
    }

    /// 该键是否有进行中的拉取
    pub fn is_pending(&self, key: &QueryKey) -> bool {
        self.in_flight.contains_key(&key.canonical())
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// 丢弃所有槽位，已发出的句柄仍可完成
    pub fn clear(&self) {
        self.in_flight.clear();
    }
}
