//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了定时失效器，按固定间隔失效一组查询键（实时数据模拟）。

use crate::client::query::QueryCache;
use crate::error::{QueryError, Result};
use crate::key::QueryKey;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// 每次触发前执行的钩子，参数为触发序号（从1开始）
pub type TickHook = Arc<dyn Fn(u64) -> BoxFuture<'static, ()> + Send + Sync>;

/// 定时失效器
///
/// 缓存本身不感知定时器；失效器只调用 `QueryCache::invalidate`。
pub struct PeriodicInvalidator {
    cache: QueryCache,
    keys: Vec<QueryKey>,
    interval: Duration,
    hook: Option<TickHook>,
    ticks: Arc<AtomicU64>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicInvalidator {
    /// 创建新的定时失效器
    ///
    /// # 参数
    ///
    /// * `cache` - 查询缓存
    /// * `keys` - 每次触发时失效的键
    /// * `interval` - 触发间隔
    pub fn new(cache: QueryCache, keys: Vec<QueryKey>, interval: Duration) -> Self {
        Self {
            cache,
            keys,
            interval,
            hook: None,
            ticks: Arc::new(AtomicU64::new(0)),
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// 由模拟器配置创建
    pub fn from_config(cache: QueryCache) -> Self {
        let sim = cache.config().simulator.clone();
        Self::new(cache, sim.keys, Duration::from_millis(sim.interval_ms))
    }

    /// 设置每次失效前执行的钩子（例如修改后端数据）
    pub fn with_hook(mut self, hook: TickHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// 已完成的触发次数
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// 启动后台任务，首次触发在一个间隔之后
    #[instrument(skip(self), level = "info", fields(keys = self.keys.len()))]
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(QueryError::Config(
                "periodic invalidator already started".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(QueryError::Config(
                "periodic invalidator interval cannot be zero".to_string(),
            ));
        }

        let cache = self.cache.clone();
        let keys = self.keys.clone();
        let hook = self.hook.clone();
        let ticks = self.ticks.clone();
        let token = self.token.clone();
        let period = self.interval;

        info!("Starting periodic invalidator, interval={:?}", period);
        self.handle = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Periodic invalidator cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let n = ticks.load(Ordering::Acquire) + 1;
                        if let Some(hook) = &hook {
                            hook(n).await;
                        }
                        cache.invalidate_all(&keys);
                        ticks.store(n, Ordering::Release);
                        debug!("Periodic invalidator tick {}", n);
                    }
                }
            }
        }));
        Ok(())
    }

    /// 停止后台任务并等待其退出
    ///
    /// 未启动时直接返回。
    pub async fn stop(&mut self) -> Result<()> {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| QueryError::Shutdown(e.to_string()))?;
        }
        // 允许再次 start
        self.token = CancellationToken::new();
        info!("Periodic invalidator stopped after {} ticks", self.ticks());
        Ok(())
    }
}

impl Drop for PeriodicInvalidator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
