//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块把仪表盘的数据接口包装为查询键族、拉取函数和变更描述。

use super::mutation::{MutationDescriptor, MutationExecutor};
use super::observer::{fetcher, QueryFetcher};
use super::query::{QueryCache, QueryEntry, QueryStatus};
use crate::error::{QueryError, Result};
use crate::filter::{self, FilterState};
use crate::key::QueryKey;
use crate::model::{Activity, Analytics, Campaign, CampaignPatch, NewActivity};
use crate::store::{DashboardStore, DEFAULT_ACTIVITY_LIMIT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{info, instrument};

pub fn latest_analytics_key() -> QueryKey {
    QueryKey::from(["analytics", "latest"])
}

pub fn analytics_key() -> QueryKey {
    QueryKey::from(["analytics"])
}

/// 营销活动使用粗粒度的单一键，任何单条记录的变更都会失效整张列表
pub fn campaigns_key() -> QueryKey {
    QueryKey::from(["campaigns"])
}

pub fn activities_key() -> QueryKey {
    QueryKey::from(["activities"])
}

/// 更新营销活动状态的输入
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub id: String,
    pub status: String,
}

/// 一页营销活动
#[derive(Debug, Clone)]
pub struct CampaignPage {
    pub campaigns: Vec<Campaign>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub first_index: usize,
    pub last_index: usize,
}

/// 仪表盘客户端
///
/// 组合查询缓存、变更执行器和数据存储。
#[derive(Clone)]
pub struct DashboardClient {
    cache: QueryCache,
    executor: MutationExecutor,
    store: Arc<dyn DashboardStore>,
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("cache", &self.cache)
            .finish()
    }
}

/// 取出条目数据
///
/// 拉取失败但仍有上一次成功的数据时返回旧数据，错误留在条目上，
/// 可通过 `DashboardClient::last_error` 读取；没有任何数据时才返回错误。
fn into_data<T: DeserializeOwned>(entry: QueryEntry) -> Result<T> {
    match entry.data_as::<T>()? {
        Some(data) => Ok(data),
        None => match entry.error() {
            Some(e) if entry.status() == QueryStatus::Error => Err(e.clone()),
            _ => Err(QueryError::NotFound(format!("no data for key {}", entry.key()))),
        },
    }
}

impl DashboardClient {
    pub fn new(cache: QueryCache, store: Arc<dyn DashboardStore>) -> Self {
        Self {
            executor: MutationExecutor::new(cache.clone()),
            cache,
            store,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn DashboardStore> {
        &self.store
    }

    /// 最近一次拉取失败的错误；条目不处于错误状态时返回 None
    pub fn last_error(&self, key: &QueryKey) -> Option<QueryError> {
        self.cache
            .peek(key)
            .filter(|entry| entry.status() == QueryStatus::Error)
            .and_then(|entry| entry.error().cloned())
    }

    pub fn latest_analytics_fetcher(&self) -> QueryFetcher<Option<Analytics>> {
        let store = self.store.clone();
        fetcher(move || {
            let store = store.clone();
            async move { store.get_latest_analytics().await }
        })
    }

    pub fn analytics_fetcher(&self) -> QueryFetcher<Vec<Analytics>> {
        let store = self.store.clone();
        fetcher(move || {
            let store = store.clone();
            async move { store.get_analytics().await }
        })
    }

    pub fn campaigns_fetcher(&self) -> QueryFetcher<Vec<Campaign>> {
        let store = self.store.clone();
        fetcher(move || {
            let store = store.clone();
            async move { store.get_campaigns().await }
        })
    }

    pub fn activities_fetcher(&self) -> QueryFetcher<Vec<Activity>> {
        let store = self.store.clone();
        fetcher(move || {
            let store = store.clone();
            async move { store.get_activities(DEFAULT_ACTIVITY_LIMIT).await }
        })
    }

    /// 最新分析快照；没有任何快照时返回 None
    pub async fn latest_analytics(&self) -> Result<Option<Analytics>> {
        let f = self.latest_analytics_fetcher();
        let entry = self.cache.fetch(&latest_analytics_key(), move || f(), None).await?;
        into_data(entry)
    }

    pub async fn analytics(&self) -> Result<Vec<Analytics>> {
        let f = self.analytics_fetcher();
        let entry = self.cache.fetch(&analytics_key(), move || f(), None).await?;
        into_data(entry)
    }

    pub async fn campaigns(&self) -> Result<Vec<Campaign>> {
        let f = self.campaigns_fetcher();
        let entry = self.cache.fetch(&campaigns_key(), move || f(), None).await?;
        into_data(entry)
    }

    pub async fn activities(&self) -> Result<Vec<Activity>> {
        let f = self.activities_fetcher();
        let entry = self.cache.fetch(&activities_key(), move || f(), None).await?;
        into_data(entry)
    }

    /// 读取营销活动并应用客户端过滤
    pub async fn campaign_page(&self, state: &FilterState) -> Result<CampaignPage> {
        let campaigns = self.campaigns().await?;
        let outcome = filter::apply(&campaigns, state)?;
        Ok(CampaignPage {
            page: outcome.page,
            total_pages: outcome.total_pages,
            total_matches: outcome.total_matches,
            first_index: outcome.first_index(),
            last_index: outcome.last_index(),
            campaigns: outcome.visible.into_iter().cloned().collect(),
        })
    }

    /// 更新营销活动状态的变更描述，成功后失效 `["campaigns"]`
    pub fn update_campaign_status_mutation(&self) -> MutationDescriptor<StatusUpdate, Campaign> {
        let store = self.store.clone();
        MutationDescriptor::new("update_campaign_status", move |input: StatusUpdate| {
            let store = store.clone();
            async move {
                store
                    .update_campaign(&input.id, CampaignPatch::status(input.status))
                    .await?
                    .ok_or_else(|| QueryError::NotFound(format!("campaign {}", input.id)))
            }
        })
        .invalidates(campaigns_key())
    }

    /// 记录动态的变更描述，成功后失效 `["activities"]`
    pub fn create_activity_mutation(&self) -> MutationDescriptor<NewActivity, Activity> {
        let store = self.store.clone();
        MutationDescriptor::new("create_activity", move |input: NewActivity| {
            let store = store.clone();
            async move { store.create_activity(input).await }
        })
        .invalidates(activities_key())
    }

    #[instrument(skip(self), level = "info")]
    pub async fn update_campaign_status(&self, id: &str, status: &str) -> Result<Campaign> {
        let descriptor = self.update_campaign_status_mutation();
        let updated = self
            .executor
            .execute(
                &descriptor,
                StatusUpdate {
                    id: id.to_string(),
                    status: status.to_string(),
                },
            )
            .await?;
        info!("Campaign {} status set to {}", updated.name, updated.status);
        Ok(updated)
    }

    pub async fn create_activity(&self, activity: NewActivity) -> Result<Activity> {
        let descriptor = self.create_activity_mutation();
        self.executor.execute(&descriptor, activity).await
    }
}
