//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询键及其规范化编码。

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 查询键的单个片段
///
/// 只允许原始值：字符串、整数和布尔值。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        KeySegment::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        KeySegment::Str(s)
    }
}

impl From<i64> for KeySegment {
    fn from(n: i64) -> Self {
        KeySegment::Int(n)
    }
}

impl From<u32> for KeySegment {
    fn from(n: u32) -> Self {
        KeySegment::Int(n as i64)
    }
}

impl From<bool> for KeySegment {
    fn from(b: bool) -> Self {
        KeySegment::Bool(b)
    }
}

/// 查询键
///
/// 有序的原始值序列，例如 `["campaigns"]` 或 `["analytics", "latest"]`。
/// 两个键等价当且仅当它们的规范字符串相同。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// 由片段列表创建查询键
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<KeySegment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// 键族名称，即第一个字符串片段
    ///
    /// 用于按族查找过期配置和指标标签。
    pub fn family(&self) -> &str {
        match self.0.first() {
            Some(KeySegment::Str(s)) => s.as_str(),
            _ => "default",
        }
    }

    /// 空键在调用处直接报配置错误
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(QueryError::Config("query key cannot be empty".to_string()));
        }
        Ok(())
    }

    /// 规范字符串
    pub fn canonical(&self) -> String {
        encode(self)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl<S: Into<KeySegment>, const N: usize> From<[S; N]> for QueryKey {
    fn from(segments: [S; N]) -> Self {
        QueryKey::new(segments)
    }
}

/// 将查询键编码为规范字符串
///
/// 使用紧凑 JSON 数组：字符串片段带引号并转义，因此 `["ab"]` 与
/// `["a","b"]` 不会冲突，`"1"` 与 `1` 也不会冲突。输出不含空白。
pub fn encode(key: &QueryKey) -> String {
    let mut out = String::with_capacity(key.0.len() * 12 + 2);
    out.push('[');
    for (i, segment) in key.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match segment {
            KeySegment::Str(s) => {
                // 字符串序列化不会失败
                out.push_str(&serde_json::Value::String(s.clone()).to_string());
            }
            KeySegment::Int(n) => out.push_str(&n.to_string()),
            KeySegment::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        }
    }
    out.push(']');
    out
}
