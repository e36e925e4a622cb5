//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存客户端：缓存、变更执行器、观察者和仪表盘键族。

pub mod dashboard;
pub mod mutation;
pub mod observer;
pub mod query;

pub use mutation::{MutationDescriptor, MutationExecutor};
pub use observer::{fetcher, QueryFetcher, QueryObserver, QueryView};
pub use query::{QueryCache, QueryEntry, QueryStatus, WeakQueryCache};
