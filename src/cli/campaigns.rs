//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了营销活动列表与状态更新命令的实现。

use super::{CampaignsArgs, UpdateArgs};
use crate::client::dashboard::{campaigns_key, CampaignPage, DashboardClient};
use crate::filter::FilterState;
use crate::store::MemStore;
use anyhow::{Context, Result};

pub async fn execute_list(client: &DashboardClient, args: &CampaignsArgs) -> Result<()> {
    let state = FilterState::default()
        .search(args.search.as_str())
        .status(args.status.as_str())
        .platform(args.platform.as_str())
        .page(args.page)
        .page_size(
            args.page_size
                .unwrap_or(client.cache().config().global.page_size),
        );

    let page = client
        .campaign_page(&state)
        .await
        .context("Failed to load campaigns")?;
    print_page(&page);
    Ok(())
}

pub async fn execute_update(
    client: &DashboardClient,
    store: &MemStore,
    args: &UpdateArgs,
) -> Result<()> {
    // 先加载一次，让列表进入缓存
    let before = client.campaigns().await.context("Failed to load campaigns")?;

    let id = match before.iter().find(|c| c.id == args.campaign) {
        Some(c) => c.id.clone(),
        None => store
            .find_campaign_by_name(&args.campaign)
            .await
            .map(|c| c.id)
            .with_context(|| format!("Campaign '{}' not found", args.campaign))?,
    };

    let updated = client
        .update_campaign_status(&id, &args.status)
        .await
        .with_context(|| format!("Failed to update campaign '{}'", args.campaign))?;
    println!("Updated: {} -> {}", updated.name, updated.status);

    let entry = client.cache().get(&campaigns_key());
    println!(
        "Cache entry {} invalidated: {}",
        campaigns_key(),
        entry.is_invalidated()
    );

    let page = client
        .campaign_page(&FilterState::default())
        .await
        .context("Failed to reload campaigns")?;
    print_page(&page);
    Ok(())
}

fn print_page(page: &CampaignPage) {
    println!(
        "{:<24} {:<14} {:<8} {:>12} {:>8} {:>6} {:>10}",
        "Campaign", "Platform", "Status", "Impressions", "Clicks", "CTR", "Spend"
    );
    for c in &page.campaigns {
        println!(
            "{:<24} {:<14} {:<8} {:>12} {:>8} {:>5}% {:>10}",
            c.name, c.platform, c.status, c.impressions, c.clicks, c.ctr, c.spend
        );
    }
    println!(
        "\nShowing {} to {} of {} results (page {}/{})",
        page.first_index,
        page.last_index,
        page.total_matches,
        page.page,
        page.total_pages.max(1)
    );
}
