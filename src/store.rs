//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了仪表盘数据存储接口及其内存实现（带种子数据）。

use crate::error::Result;
use crate::model::{
    Activity, Analytics, Campaign, CampaignPatch, NewActivity, NewAnalytics, NewCampaign,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

/// 默认返回的动态条数
pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;

/// 仪表盘数据存储
///
/// 查询缓存只把这些方法当作异步函数包装，不关心具体实现。
#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn get_analytics(&self) -> Result<Vec<Analytics>>;

    /// 按日期取最新的分析快照
    async fn get_latest_analytics(&self) -> Result<Option<Analytics>>;

    async fn create_analytics(&self, analytics: NewAnalytics) -> Result<Analytics>;

    /// 按插入顺序返回所有营销活动
    async fn get_campaigns(&self) -> Result<Vec<Campaign>>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign>;

    /// 部分更新营销活动，不存在时返回 None
    async fn update_campaign(&self, id: &str, patch: CampaignPatch) -> Result<Option<Campaign>>;

    /// 按时间倒序返回最多 `limit` 条动态
    async fn get_activities(&self, limit: usize) -> Result<Vec<Activity>>;

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity>;
}

/// 内存存储
///
/// 简单的键控集合，无淘汰、无持久化。
#[derive(Debug, Default)]
pub struct MemStore {
    analytics: RwLock<Vec<Analytics>>,
    campaigns: RwLock<Vec<Campaign>>,
    activities: RwLock<Vec<Activity>>,
}

impl MemStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带种子数据的存储
    pub fn seeded() -> Self {
        let now = Utc::now();

        let analytics = vec![
            Analytics {
                id: Uuid::new_v4().to_string(),
                date: now,
                revenue: "127543.00".to_string(),
                users: 24891,
                conversions: 1847,
                growth_rate: "23.70".to_string(),
                traffic_sources: json!({
                    "Organic Search": 42.3,
                    "Social Media": 28.7,
                    "Paid Ads": 19.1,
                    "Direct": 9.9
                }),
                campaign_data: json!({
                    "Google Ads": { "conversions": 485, "impressions": 1250 },
                    "Facebook": { "conversions": 392, "impressions": 980 },
                    "LinkedIn": { "conversions": 287, "impressions": 670 },
                    "Twitter": { "conversions": 156, "impressions": 420 },
                    "YouTube": { "conversions": 203, "impressions": 560 }
                }),
            },
            Analytics {
                id: Uuid::new_v4().to_string(),
                date: now - Duration::days(1),
                revenue: "118932.00".to_string(),
                users: 23456,
                conversions: 1721,
                growth_rate: "21.40".to_string(),
                traffic_sources: json!({
                    "Organic Search": 40.1,
                    "Social Media": 30.2,
                    "Paid Ads": 20.3,
                    "Direct": 9.4
                }),
                campaign_data: json!({
                    "Google Ads": { "conversions": 452, "impressions": 1180 },
                    "Facebook": { "conversions": 378, "impressions": 920 },
                    "LinkedIn": { "conversions": 265, "impressions": 640 },
                    "Twitter": { "conversions": 142, "impressions": 390 },
                    "YouTube": { "conversions": 194, "impressions": 520 }
                }),
            },
        ];

        let campaign = |name: &str, platform: &str, status: &str, impressions, clicks, ctr: &str, spend: &str, days| Campaign {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            platform: platform.to_string(),
            status: status.to_string(),
            impressions,
            clicks,
            ctr: ctr.to_string(),
            spend: spend.to_string(),
            created_at: Some(now - Duration::days(days)),
        };
        let campaigns = vec![
            campaign("Summer Sale Campaign", "Google Ads", "Active", 124_593, 3847, "3.09", "2459.00", 7),
            campaign("Holiday Promotions", "Facebook Ads", "Paused", 89_237, 2183, "2.45", "1892.00", 14),
            campaign("Brand Awareness", "LinkedIn Ads", "Active", 67_194, 1642, "2.44", "1237.00", 21),
            campaign("Retargeting Campaign", "Google Ads", "Ended", 156_847, 7293, "4.65", "3284.00", 30),
            campaign("Mobile App Install", "Facebook Ads", "Active", 98_435, 2947, "2.99", "1856.00", 5),
            campaign("Video Campaign", "YouTube Ads", "Active", 234_567, 5632, "2.40", "3421.00", 12),
            campaign("B2B Lead Generation", "LinkedIn Ads", "Active", 45_632, 1234, "2.70", "2145.00", 18),
            campaign("Black Friday Special", "Google Ads", "Ended", 345_678, 12_345, "3.57", "5678.00", 60),
        ];

        let activity = |kind: &str, title: &str, description: &str, hours, icon: &str, color: &str| Activity {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            description: Some(description.to_string()),
            timestamp: Some(now - Duration::hours(hours)),
            icon: icon.to_string(),
            color: color.to_string(),
        };
        let activities = vec![
            activity("campaign", "Campaign \"Summer Sale\" launched", "New campaign started with $5000 budget", 2, "check", "green"),
            activity("milestone", "Revenue target reached", "Monthly revenue goal achieved", 4, "chart-line", "blue"),
            activity("segment", "New user segment created", "High-value customers segment defined", 6, "users", "purple"),
            activity("alert", "Budget alert triggered", "Campaign spending reached 80% of budget", 8, "exclamation", "orange"),
            activity("optimization", "Auto-bid optimization enabled", "AI-powered bid optimization activated for Google Ads", 12, "check", "green"),
            activity("conversion", "High conversion rate detected", "Mobile App Install campaign showing 15% above average CVR", 16, "chart-line", "blue"),
            activity("audience", "Lookalike audience created", "New lookalike audience based on top 10% customers", 20, "users", "purple"),
            activity("performance", "CTR improvement noted", "Video campaign CTR increased by 23% this week", 24, "chart-line", "blue"),
        ];

        Self {
            analytics: RwLock::new(analytics),
            campaigns: RwLock::new(campaigns),
            activities: RwLock::new(activities),
        }
    }

    /// 按名称查找营销活动（不区分大小写）
    pub async fn find_campaign_by_name(&self, name: &str) -> Option<Campaign> {
        self.campaigns
            .read()
            .await
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}

#[async_trait]
impl DashboardStore for MemStore {
    async fn get_analytics(&self) -> Result<Vec<Analytics>> {
        Ok(self.analytics.read().await.clone())
    }

    async fn get_latest_analytics(&self) -> Result<Option<Analytics>> {
        Ok(self
            .analytics
            .read()
            .await
            .iter()
            .max_by_key(|a| a.date)
            .cloned())
    }

    #[instrument(skip(self, analytics), level = "debug")]
    async fn create_analytics(&self, analytics: NewAnalytics) -> Result<Analytics> {
        let record = Analytics {
            id: Uuid::new_v4().to_string(),
            date: analytics.date,
            revenue: analytics.revenue,
            users: analytics.users,
            conversions: analytics.conversions,
            growth_rate: analytics.growth_rate,
            traffic_sources: analytics.traffic_sources,
            campaign_data: analytics.campaign_data,
        };
        self.analytics.write().await.push(record.clone());
        debug!("MemStore: created analytics id={}", record.id);
        Ok(record)
    }

    async fn get_campaigns(&self) -> Result<Vec<Campaign>> {
        Ok(self.campaigns.read().await.clone())
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self
            .campaigns
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    #[instrument(skip(self, campaign), level = "debug")]
    async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign> {
        let record = Campaign {
            id: Uuid::new_v4().to_string(),
            name: campaign.name,
            platform: campaign.platform,
            status: campaign.status,
            impressions: campaign.impressions,
            clicks: campaign.clicks,
            ctr: campaign.ctr,
            spend: campaign.spend,
            created_at: Some(Utc::now()),
        };
        self.campaigns.write().await.push(record.clone());
        debug!("MemStore: created campaign id={}", record.id);
        Ok(record)
    }

    #[instrument(skip(self, patch), level = "debug")]
    async fn update_campaign(&self, id: &str, patch: CampaignPatch) -> Result<Option<Campaign>> {
        let mut campaigns = self.campaigns.write().await;
        match campaigns.iter_mut().find(|c| c.id == id) {
            Some(existing) => {
                patch.apply(existing);
                debug!("MemStore: updated campaign id={}", id);
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_activities(&self, limit: usize) -> Result<Vec<Activity>> {
        let mut activities = self.activities.read().await.clone();
        activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        activities.truncate(limit);
        Ok(activities)
    }

    #[instrument(skip(self, activity), level = "debug")]
    async fn create_activity(&self, activity: NewActivity) -> Result<Activity> {
        let record = Activity {
            id: Uuid::new_v4().to_string(),
            kind: activity.kind,
            title: activity.title,
            description: activity.description,
            timestamp: Some(Utc::now()),
            icon: activity.icon,
            color: activity.color,
        };
        self.activities.write().await.push(record.clone());
        Ok(record)
    }
}
