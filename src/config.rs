//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存的配置结构和解析逻辑。

use crate::error::{QueryError, Result};
use crate::key::QueryKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 查询缓存配置
#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueryConfig {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    /// 按键族覆盖的配置，键族为查询键的第一个片段
    #[serde(default)]
    pub families: HashMap<String, FamilyConfig>,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// 全局配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 默认过期时间（毫秒），0 表示数据拉取后立即视为过期
    pub default_stale_after_ms: u64,
    /// 表格分页大小
    pub page_size: usize,
    /// 是否启用指标收集
    pub enable_metrics: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_stale_after_ms: 0,
            page_size: 10,
            enable_metrics: true,
        }
    }
}

/// 键族配置
#[derive(Deserialize, Clone, Debug)]
pub struct FamilyConfig {
    /// 该键族的过期时间（毫秒）
    pub stale_after_ms: u64,
}

/// 实时模拟器配置
///
/// 模拟器只是一个定时失效器，按间隔失效固定的键集合。
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SimulatorConfig {
    pub enabled: bool,
    /// 失效间隔（毫秒）
    pub interval_ms: u64,
    /// 每次触发时失效的键
    pub keys: Vec<QueryKey>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 2000,
            keys: vec![QueryKey::from(["analytics", "latest"])],
        }
    }
}

impl QueryConfig {
    /// 从TOML字符串解析并验证配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: QueryConfig =
            toml::from_str(s).map_err(|e| QueryError::Config(e.to_string()))?;
        config.validate().map_err(QueryError::Config)?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 返回键对应的过期时间
    ///
    /// 键族覆盖优先，否则使用全局默认值。
    pub fn stale_after_for(&self, key: &QueryKey) -> Duration {
        let ms = self
            .families
            .get(key.family())
            .map(|f| f.stale_after_ms)
            .unwrap_or(self.global.default_stale_after_ms);
        Duration::from_millis(ms)
    }

    /// 验证配置
    ///
    /// 检查配置值是否在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.global.page_size == 0 {
            return Err("Global page_size cannot be zero".to_string());
        }

        if self.global.page_size > 1000 {
            return Err("Global page_size cannot exceed 1000".to_string());
        }

        if self.global.default_stale_after_ms > 86_400_000 {
            return Err("Global default_stale_after_ms cannot exceed 24 hours".to_string());
        }

        for (name, family) in &self.families {
            if name.is_empty() {
                return Err("Family name cannot be empty".to_string());
            }

            if family.stale_after_ms > 86_400_000 {
                return Err(format!(
                    "Family '{}' stale_after_ms cannot exceed 24 hours",
                    name
                ));
            }
        }

        if self.simulator.enabled {
            if self.simulator.interval_ms < 10 {
                return Err("Simulator interval_ms must be at least 10 ms".to_string());
            }

            if self.simulator.keys.is_empty() {
                return Err("Simulator keys cannot be empty when enabled".to_string());
            }

            for key in &self.simulator.keys {
                if key.segments().is_empty() {
                    return Err("Simulator keys cannot contain an empty key".to_string());
                }
            }
        }

        Ok(())
    }
}
