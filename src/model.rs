//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了仪表盘的数据记录：分析快照、营销活动和动态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分析快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub id: String,
    pub date: DateTime<Utc>,
    /// 十进制字符串，保留两位小数
    pub revenue: String,
    pub users: u64,
    pub conversions: u64,
    pub growth_rate: String,
    pub traffic_sources: Value,
    pub campaign_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalytics {
    pub date: DateTime<Utc>,
    pub revenue: String,
    pub users: u64,
    pub conversions: u64,
    pub growth_rate: String,
    pub traffic_sources: Value,
    pub campaign_data: Value,
}

/// 营销活动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub status: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: String,
    pub spend: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub name: String,
    pub platform: String,
    pub status: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: String,
    pub spend: String,
}

/// 营销活动的部分更新，未设置的字段保持不变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub status: Option<String>,
    pub impressions: Option<u64>,
    pub clicks: Option<u64>,
    pub ctr: Option<String>,
    pub spend: Option<String>,
}

impl CampaignPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn apply(self, campaign: &mut Campaign) {
        if let Some(v) = self.name {
            campaign.name = v;
        }
        if let Some(v) = self.platform {
            campaign.platform = v;
        }
        if let Some(v) = self.status {
            campaign.status = v;
        }
        if let Some(v) = self.impressions {
            campaign.impressions = v;
        }
        if let Some(v) = self.clicks {
            campaign.clicks = v;
        }
        if let Some(v) = self.ctr {
            campaign.ctr = v;
        }
        if let Some(v) = self.spend {
            campaign.spend = v;
        }
    }
}

/// 动态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
}
