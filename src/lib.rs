//! oxquery - 键控异步查询缓存
//!
//! 提供按键寻址的查询/变更缓存：请求去重、过期判断、失效通知，
//! 以及对缓存结果的客户端过滤和分页。

#![doc(html_root_url = "https://docs.rs/oxquery/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod key;
pub mod metrics;
pub mod model;
pub mod store;
pub mod sync;
pub mod telemetry;

// Re-export commonly used items
pub use client::{
    MutationDescriptor, MutationExecutor, QueryCache, QueryEntry, QueryObserver, QueryStatus,
};
pub use config::QueryConfig;
pub use error::{QueryError, Result};
pub use filter::{FilterOutcome, FilterState};
pub use key::{encode, KeySegment, QueryKey};
pub use sync::refresher::PeriodicInvalidator;

/// oxquery 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
