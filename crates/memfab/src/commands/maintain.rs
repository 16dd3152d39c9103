//! Maintenance commands: decay, rebuild, stats.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use colored::Colorize;

use crate::cli::DecayArgs;
use crate::config::Config;

use super::open_fabric;

/// Apply importance decay.
pub async fn decay(args: DecayArgs, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;

    let changed = match args.user_id {
        Some(user_id) if !args.all => fabric.decay(&user_id).await.context("Failed to decay")?,
        _ => fabric.decay_all().await.context("Failed to decay")?,
    };

    println!(
        "{} Decayed {} records (half-life {}h)",
        "✓".green(),
        changed,
        config.fabric.half_life_hours
    );
    Ok(())
}

/// Re-embed a user's semantic memories.
pub async fn rebuild(user_id: &str, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    let count = fabric
        .rebuild_index(user_id)
        .await
        .context("Failed to rebuild semantic index")?;

    println!("{} Re-embedded {} records for {}", "✓".green(), count, user_id.cyan());
    Ok(())
}

/// Show per-tier counts.
pub async fn stats(user_id: &str, json: bool, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    let stats = fabric.stats(user_id).await.context("Failed to get stats")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", format!("Memory for {}", user_id).cyan().bold());
    println!("{}", "─".repeat(40));
    println!(
        "  Recent:     {} / {}",
        stats.recent, config.fabric.max_items
    );
    println!("  Summaries:  {}", stats.summaries);
    println!("  Semantic:   {}", stats.semantic_records);
    println!("  Summarized through #{}", stats.summarized_through);

    if let Ok(Some(latest)) = fabric
        .archive()
        .fetch_top(user_id, 1)
        .await
        .map(|s| s.into_iter().next())
    {
        println!("  Last summary: {}", format_timestamp(latest.created_at).dimmed());
    }
    Ok(())
}

/// List users with semantic memories.
pub async fn users(config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    let users = fabric.known_users()?;

    if users.is_empty() {
        println!("{} No users yet", "⚠".yellow());
        return Ok(());
    }
    for user in users {
        println!("  {}", user);
    }
    Ok(())
}

fn format_timestamp(ts: f64) -> String {
    Utc.timestamp_micros((ts * 1_000_000.0) as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{:.0}", ts))
}
