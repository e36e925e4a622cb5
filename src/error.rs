//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 查询缓存错误类型枚举
///
/// 错误值会被存入查询条目并分发给所有等待者，因此必须可克隆。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// 拉取或变更函数失败（网络或服务端错误）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 配置错误（无效的键或过滤配置）
    #[error("Configuration error: {0}")]
    Config(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 记录不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 关闭错误
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Serialization(e.to_string())
    }
}

/// 查询操作结果类型别名
pub type Result<T> = std::result::Result<T, QueryError>;
