//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存的指标收集功能。

use dashmap::DashMap;
use tracing::{span, Level};

/// 指标收集器
///
/// 每个查询缓存实例持有一份，键格式为 "family:op:result"
#[derive(Debug, Default)]
pub struct QueryMetrics {
    requests_total: DashMap<String, u64>,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `family` - 键族
    /// * `op` - 操作类型（fetch/invalidate/mutation）
    /// * `result` - 操作结果（start/dedup/success/error）
    pub fn record(&self, family: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "query_metric", family, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}", family, op, result);
        *self.requests_total.entry(key).or_insert(0) += 1;
    }

    /// 读取单个计数
    pub fn count(&self, family: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", family, op, result);
        self.requests_total.get(&key).map(|v| *v).unwrap_or(0)
    }

    pub fn reset(&self) {
        self.requests_total.clear();
    }

    /// 将所有指标格式化为文本，按标签排序以便输出稳定
    pub fn render(&self) -> String {
        let mut rows: Vec<(String, u64)> = self
            .requests_total
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        rows.sort();

        let mut output = String::new();
        for (k, v) in rows {
            let parts: Vec<&str> = k.splitn(3, ':').collect();
            if parts.len() == 3 {
                output.push_str(&format!(
                    "query_requests_total{{family=\"{}\", op=\"{}\", result=\"{}\"}} {}\n",
                    parts[0], parts[1], parts[2], v
                ));
            }
        }
        output
    }
}
