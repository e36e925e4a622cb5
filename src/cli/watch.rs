//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了实时刷新命令：定时修改分析数据并失效对应的查询键。

use super::WatchArgs;
use crate::client::dashboard::{latest_analytics_key, DashboardClient};
use crate::client::{QueryObserver, QueryStatus};
use crate::model::{Analytics, NewAnalytics};
use crate::store::{DashboardStore, MemStore};
use crate::sync::refresher::{PeriodicInvalidator, TickHook};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::FutureExt;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// 在最新快照基础上随机漂移，生成下一份快照
fn drift(prev: &Analytics) -> NewAnalytics {
    let mut rng = rand::thread_rng();
    let revenue = prev.revenue.parse::<f64>().unwrap_or(0.0) + rng.gen_range(0.0..50.0);
    let users = (prev.users as i64 + rng.gen_range(-4..6)).max(0) as u64;
    let conversions = prev.conversions + u64::from(rng.gen_bool(0.3));

    NewAnalytics {
        date: Utc::now(),
        revenue: format!("{:.2}", revenue),
        users,
        conversions,
        growth_rate: prev.growth_rate.clone(),
        traffic_sources: prev.traffic_sources.clone(),
        campaign_data: prev.campaign_data.clone(),
    }
}

pub async fn execute(client: &DashboardClient, store: &Arc<MemStore>, args: &WatchArgs) -> Result<()> {
    let interval = Duration::from_millis(
        args.interval_ms
            .unwrap_or(client.cache().config().simulator.interval_ms),
    );

    let _observer = QueryObserver::mount(
        client.cache(),
        latest_analytics_key(),
        client.latest_analytics_fetcher(),
        None,
        |view| {
            if view.status != QueryStatus::Success {
                return;
            }
            if let Ok(Some(Some(a))) = view.entry.data_as::<Option<Analytics>>() {
                println!(
                    "[{}] users={} revenue=${} conversions={}",
                    a.date.format("%H:%M:%S"),
                    a.users,
                    a.revenue,
                    a.conversions
                );
            }
        },
    )
    .context("Failed to mount analytics observer")?;

    let hook_store = store.clone();
    let hook: TickHook = Arc::new(move |_tick| {
        let store = hook_store.clone();
        async move {
            if let Ok(Some(prev)) = store.get_latest_analytics().await {
                let _ = store.create_analytics(drift(&prev)).await;
            }
        }
        .boxed()
    });

    let mut invalidator =
        PeriodicInvalidator::new(client.cache().clone(), vec![latest_analytics_key()], interval)
            .with_hook(hook);
    invalidator.start()?;

    while invalidator.ticks() < args.ticks {
        tokio::time::sleep(interval / 4).await;
    }
    // 等最后一次重新拉取落地
    tokio::time::sleep(interval / 4).await;
    invalidator.stop().await?;
    Ok(())
}
