//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存的同步机制，包括请求去重、失效总线和定时失效。

pub mod invalidation;
pub mod refresher;
pub mod single_flight;
