//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了客户端过滤引擎：对本地列表做搜索、筛选和分页，无副作用。

use crate::error::{QueryError, Result};
use crate::model::Campaign;
use serde::{Deserialize, Serialize};

/// 表示“不过滤”的哨兵值
pub const ALL: &str = "all";

/// 可被过滤的记录
pub trait Filterable {
    fn name(&self) -> &str;
    fn platform(&self) -> &str;
    fn status(&self) -> &str;
}

impl Filterable for Campaign {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// 过滤状态
///
/// 除这些字段外没有任何隐藏状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub search_term: String,
    pub status_filter: String,
    pub platform_filter: String,
    /// 页码，从1开始
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            status_filter: ALL.to_string(),
            platform_filter: ALL.to_string(),
            page: 1,
            page_size: 10,
        }
    }
}

impl FilterState {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status_filter = status.into();
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_filter = platform.into();
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// 过滤结果
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a, T> {
    pub visible: Vec<&'a T>,
    pub total_pages: usize,
    /// 夹取后的实际页码
    pub page: usize,
    /// 过滤后（分页前）的记录数
    pub total_matches: usize,
    /// 当前页在过滤结果中的起始偏移
    pub offset: usize,
}

impl<T> FilterOutcome<'_, T> {
    /// 当前页第一条记录的序号（从1开始），无记录时为0
    pub fn first_index(&self) -> usize {
        if self.visible.is_empty() {
            0
        } else {
            self.offset + 1
        }
    }

    /// 当前页最后一条记录的序号
    pub fn last_index(&self) -> usize {
        self.offset + self.visible.len()
    }
}

fn is_all(filter: &str) -> bool {
    let trimmed = filter.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL)
}

fn matches<T: Filterable>(item: &T, search: &str, status: &str, platform: &str) -> bool {
    let name = item.name().to_lowercase();
    let item_platform = item.platform().to_lowercase();

    let matches_search = search.is_empty() || name.contains(search) || item_platform.contains(search);
    let matches_status = status.is_empty() || item.status().to_lowercase() == status;
    let matches_platform = platform.is_empty() || item_platform.contains(platform);

    matches_search && matches_status && matches_platform
}

/// 应用过滤状态
///
/// 搜索对名称和平台做不区分大小写的子串匹配（任一命中即可）；
/// 状态精确匹配，平台子串匹配，"all" 表示该维度不过滤。
/// 页码越界时静默夹取到 `[1, total_pages]`。
///
/// # 返回值
///
/// `page_size` 为0时返回配置错误
pub fn apply<'a, T: Filterable>(items: &'a [T], state: &FilterState) -> Result<FilterOutcome<'a, T>> {
    if state.page_size == 0 {
        return Err(QueryError::Config("page_size cannot be zero".to_string()));
    }

    let search = state.search_term.trim().to_lowercase();
    let status = if is_all(&state.status_filter) {
        String::new()
    } else {
        state.status_filter.trim().to_lowercase()
    };
    let platform = if is_all(&state.platform_filter) {
        String::new()
    } else {
        state.platform_filter.trim().to_lowercase()
    };

    let filtered: Vec<&T> = items
        .iter()
        .filter(|item| matches(*item, &search, &status, &platform))
        .collect();

    let total_matches = filtered.len();
    let total_pages = total_matches.div_ceil(state.page_size);
    let page = state.page.clamp(1, total_pages.max(1));
    let offset = (page - 1) * state.page_size;

    let visible = filtered
        .into_iter()
        .skip(offset)
        .take(state.page_size)
        .collect();

    Ok(FilterOutcome {
        visible,
        total_pages,
        page,
        total_matches,
        offset,
    })
}
