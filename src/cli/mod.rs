//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::client::dashboard::DashboardClient;
use crate::client::QueryCache;
use crate::config::QueryConfig;
use crate::store::MemStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "oxquery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Print cache metrics after the command")]
    pub metrics: bool,

    #[arg(long, global = true, default_value = "warn", help = "Default log filter")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "campaigns", about = "List campaigns with search, filters and paging")]
    Campaigns(CampaignsArgs),

    #[command(name = "update", about = "Change a campaign's status and show the refreshed list")]
    Update(UpdateArgs),

    #[command(name = "watch", about = "Run the real-time refresher and print refreshed analytics")]
    Watch(WatchArgs),
}

#[derive(Parser, Debug)]
pub struct CampaignsArgs {
    #[arg(short, long, default_value = "", help = "Search name or platform")]
    pub search: String,

    #[arg(long, default_value = "all", help = "Exact status filter")]
    pub status: String,

    #[arg(long, default_value = "all", help = "Platform substring filter")]
    pub platform: String,

    #[arg(short, long, default_value_t = 1, help = "Page number (clamped)")]
    pub page: usize,

    #[arg(long, help = "Page size, defaults to the configured value")]
    pub page_size: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    #[arg(help = "Campaign id or name")]
    pub campaign: String,

    #[arg(help = "New status, e.g. Active, Paused, Ended")]
    pub status: String,
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[arg(short, long, default_value_t = 3, help = "Number of refresh ticks")]
    pub ticks: u64,

    #[arg(short, long, help = "Tick interval in ms, defaults to the configured value")]
    pub interval_ms: Option<u64>,
}

mod campaigns;
mod watch;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("oxquery", &cli.log_level);

    let config = match &cli.config {
        Some(path) => QueryConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => QueryConfig::default(),
    };

    let cache = QueryCache::new(config);
    let store = Arc::new(MemStore::seeded());
    let client = DashboardClient::new(cache.clone(), store.clone());

    match &cli.command {
        Commands::Campaigns(args) => campaigns::execute_list(&client, args).await?,
        Commands::Update(args) => campaigns::execute_update(&client, &store, args).await?,
        Commands::Watch(args) => watch::execute(&client, &store, args).await?,
    }

    if cli.metrics {
        println!("\n=== Query Metrics ===\n");
        print!("{}", cache.metrics().render());
    }

    cache.clear();
    Ok(())
}
