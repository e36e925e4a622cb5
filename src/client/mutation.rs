//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了变更执行器：执行变更，成功后在返回前失效声明的查询键。

use super::query::QueryCache;
use crate::error::Result;
use crate::key::QueryKey;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 变更函数
pub type MutationFn<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R>> + Send + Sync>;

/// 变更描述
///
/// 无状态，可重复调用。
pub struct MutationDescriptor<I, R> {
    name: String,
    run: MutationFn<I, R>,
    invalidates: BTreeSet<QueryKey>,
}

impl<I, R> Clone for MutationDescriptor<I, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: self.run.clone(),
            invalidates: self.invalidates.clone(),
        }
    }
}

impl<I, R> std::fmt::Debug for MutationDescriptor<I, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

impl<I, R> MutationDescriptor<I, R>
where
    I: Send + 'static,
    R: Send + 'static,
{
    /// 创建变更描述
    ///
    /// # 参数
    ///
    /// * `name` - 变更名称，用于日志和指标
    /// * `run` - 变更函数
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move |input| run(input).boxed()),
            invalidates: BTreeSet::new(),
        }
    }

    /// 声明成功后需要失效的键
    pub fn invalidates(mut self, key: impl Into<QueryKey>) -> Self {
        self.invalidates.insert(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invalidated_keys(&self) -> &BTreeSet<QueryKey> {
        &self.invalidates
    }
}

/// 变更执行器
///
/// 多个变更可以并发执行，各自触发自己的失效集合；标记过期满足交换律，无需互斥。
#[derive(Clone, Debug)]
pub struct MutationExecutor {
    cache: QueryCache,
}

impl MutationExecutor {
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// 执行变更
    ///
    /// 成功时先失效全部声明的键再返回结果，等待变更的调用方随后读取缓存必然看到已失效的条目。
    /// 失败时不做任何失效，直接把错误交给调用方。
    #[instrument(skip_all, level = "debug", fields(mutation = %descriptor.name))]
    pub async fn execute<I, R>(&self, descriptor: &MutationDescriptor<I, R>, input: I) -> Result<R>
    where
        I: Send + 'static,
        R: Send + 'static,
    {
        match (descriptor.run)(input).await {
            Ok(result) => {
                debug!(
                    "Mutation {} succeeded, invalidating {} keys",
                    descriptor.name,
                    descriptor.invalidates.len()
                );
                self.cache.invalidate_all(&descriptor.invalidates);
                self.record(descriptor, "success");
                Ok(result)
            }
            Err(e) => {
                warn!("Mutation {} failed: {}", descriptor.name, e);
                self.record(descriptor, "error");
                Err(e)
            }
        }
    }

    fn record<I, R>(&self, descriptor: &MutationDescriptor<I, R>, result: &str) {
        if self.cache.config().global.enable_metrics {
            self.cache
                .metrics()
                .record(&descriptor.name, "mutation", result);
        }
    }
}
