//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 仪表盘客户端集成测试：内存存储、过滤分页、变更后刷新、存储故障

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::{cache_with_stale_after, setup_logging};
use mockall::mock;
use oxquery::client::dashboard::{activities_key, campaigns_key, DashboardClient};
use oxquery::model::{
    Activity, Analytics, Campaign, CampaignPatch, NewActivity, NewAnalytics, NewCampaign,
};
use oxquery::store::{DashboardStore, MemStore};
use oxquery::{FilterState, QueryError, QueryStatus, Result};
use std::sync::Arc;

mock! {
    pub Store {}

    #[async_trait]
    impl DashboardStore for Store {
        async fn get_analytics(&self) -> Result<Vec<Analytics>>;
        async fn get_latest_analytics(&self) -> Result<Option<Analytics>>;
        async fn create_analytics(&self, analytics: NewAnalytics) -> Result<Analytics>;
        async fn get_campaigns(&self) -> Result<Vec<Campaign>>;
        async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>>;
        async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign>;
        async fn update_campaign(&self, id: &str, patch: CampaignPatch) -> Result<Option<Campaign>>;
        async fn get_activities(&self, limit: usize) -> Result<Vec<Activity>>;
        async fn create_activity(&self, activity: NewActivity) -> Result<Activity>;
    }
}

fn seeded_client() -> DashboardClient {
    DashboardClient::new(cache_with_stale_after(60_000), Arc::new(MemStore::seeded()))
}

#[tokio::test]
async fn test_seeded_reads_go_through_cache() {
    setup_logging();

    let client = seeded_client();

    let latest = client.latest_analytics().await.unwrap().unwrap();
    assert_eq!(latest.revenue, "127543.00");
    assert_eq!(latest.users, 24891);

    let campaigns = client.campaigns().await.unwrap();
    assert_eq!(campaigns.len(), 8);
    assert_eq!(campaigns[0].name, "Summer Sale Campaign");

    let activities = client.activities().await.unwrap();
    assert_eq!(activities.len(), 8);
    assert_eq!(activities[0].title, "Campaign \"Summer Sale\" launched");

    // 第二次读取命中缓存
    client.campaigns().await.unwrap();
    let metrics = client.cache().metrics();
    assert_eq!(metrics.count("campaigns", "fetch", "start"), 1);
    assert_eq!(metrics.count("analytics", "fetch", "start"), 1);
}

#[tokio::test]
async fn test_campaign_page_search_and_paging() {
    setup_logging();

    let client = seeded_client();

    let google = client
        .campaign_page(&FilterState::default().search("google"))
        .await
        .unwrap();
    let names: Vec<&str> = google.campaigns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Summer Sale Campaign",
            "Retargeting Campaign",
            "Black Friday Special"
        ]
    );
    assert_eq!(google.total_matches, 3);
    assert_eq!((google.first_index, google.last_index), (1, 3));

    let paged = client
        .campaign_page(&FilterState::default().page_size(3).page(99))
        .await
        .unwrap();
    assert_eq!(paged.page, 3);
    assert_eq!(paged.total_pages, 3);
    assert_eq!(paged.campaigns.len(), 2);
    assert_eq!((paged.first_index, paged.last_index), (7, 8));

    let none = client
        .campaign_page(&FilterState::default().status("Draft"))
        .await
        .unwrap();
    assert!(none.campaigns.is_empty());
    assert_eq!((none.page, none.total_pages), (1, 0));

    // 过滤只读缓存，不会重新拉取
    assert_eq!(
        client.cache().metrics().count("campaigns", "fetch", "start"),
        1
    );
}

/// 测试状态变更后列表被失效并重新拉取
#[tokio::test]
async fn test_update_status_refreshes_campaign_list() {
    setup_logging();

    let client = seeded_client();
    let before = client.campaigns().await.unwrap();
    let holiday = before
        .iter()
        .find(|c| c.name == "Holiday Promotions")
        .unwrap()
        .clone();
    assert_eq!(holiday.status, "Paused");

    let updated = client
        .update_campaign_status(&holiday.id, "Active")
        .await
        .unwrap();
    assert_eq!(updated.status, "Active");
    assert!(client.cache().get(&campaigns_key()).is_invalidated());

    let after = client.campaigns().await.unwrap();
    let refreshed = after.iter().find(|c| c.id == holiday.id).unwrap();
    assert_eq!(refreshed.status, "Active");
    assert_eq!(
        client.cache().metrics().count("campaigns", "fetch", "start"),
        2
    );
}

#[tokio::test]
async fn test_update_missing_campaign_is_not_found() {
    setup_logging();

    let client = seeded_client();
    client.campaigns().await.unwrap();

    let result = client.update_campaign_status("no-such-id", "Ended").await;

    assert!(matches!(result, Err(QueryError::NotFound(_))));
    assert!(!client.cache().get(&campaigns_key()).is_invalidated());
}

#[tokio::test]
async fn test_create_activity_invalidates_feed() {
    setup_logging();

    let client = seeded_client();
    client.activities().await.unwrap();

    let created = client
        .create_activity(NewActivity {
            kind: "campaign".to_string(),
            title: "Campaign \"Spring Launch\" created".to_string(),
            description: None,
            icon: "check".to_string(),
            color: "green".to_string(),
        })
        .await
        .unwrap();
    assert!(client.cache().get(&activities_key()).is_invalidated());

    let feed = client.activities().await.unwrap();
    assert_eq!(feed[0].id, created.id);
    assert_eq!(feed.len(), 9);
}

/// 测试存储故障以错误状态呈现，且下一次读取会重试
#[tokio::test]
async fn test_store_failure_surfaces_and_retries() {
    setup_logging();

    let mut store = MockStore::new();
    let mut seq = mockall::Sequence::new();
    store
        .expect_get_campaigns()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(QueryError::Transport("connection refused".to_string())));
    store
        .expect_get_campaigns()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Vec::new()));

    let client = DashboardClient::new(cache_with_stale_after(60_000), Arc::new(store));

    let failed = client.campaigns().await;
    assert_eq!(
        failed,
        Err(QueryError::Transport("connection refused".to_string()))
    );
    let entry = client.cache().get(&campaigns_key());
    assert_eq!(entry.status(), QueryStatus::Error);
    assert!(entry.data().is_none());

    let retried = client.campaigns().await.unwrap();
    assert!(retried.is_empty());
    assert_eq!(client.cache().get(&campaigns_key()).status(), QueryStatus::Success);
}

#[tokio::test]
async fn test_empty_store_latest_is_none() {
    setup_logging();

    let mut store = MockStore::new();
    store.expect_get_latest_analytics().returning(|| Ok(None));

    let client = DashboardClient::new(cache_with_stale_after(60_000), Arc::new(store));

    assert_eq!(client.latest_analytics().await, Ok(None));
}

/// 重新拉取失败时仍返回上一次成功的数据，错误留在条目上
#[tokio::test]
async fn test_failed_refetch_keeps_last_known_data() {
    setup_logging();

    let mut store = MockStore::new();
    let mut seq = mockall::Sequence::new();
    store
        .expect_get_campaigns()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Vec::new()));
    store
        .expect_get_campaigns()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(QueryError::Transport("down".to_string())));

    let client = DashboardClient::new(cache_with_stale_after(60_000), Arc::new(store));

    assert_eq!(client.campaigns().await, Ok(Vec::new()));
    assert_eq!(client.last_error(&campaigns_key()), None);

    client.cache().invalidate(&campaigns_key());
    let second = client.campaigns().await;

    assert_eq!(second, Ok(Vec::new()));
    let entry = client.cache().get(&campaigns_key());
    assert_eq!(entry.status(), QueryStatus::Error);
    assert!(entry.data().is_some());
    assert_eq!(
        client.last_error(&campaigns_key()),
        Some(QueryError::Transport("down".to_string()))
    );
}
