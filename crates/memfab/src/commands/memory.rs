//! Memory commands: record interactions and retrieve context.

use anyhow::{Context, Result};
use colored::Colorize;
use memfab_core::{RetrievedContext, StepOutcome, WriteReport};

use crate::cli::{AddArgs, ContextArgs};
use crate::config::Config;

use super::open_fabric;

/// Record an interaction.
pub async fn add(args: AddArgs, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    let report = fabric
        .add_interaction(&args.user_id, &args.text, args.significance)
        .await
        .context("Failed to record interaction")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Retrieve context for a query.
pub async fn context(args: ContextArgs, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    let context = fabric
        .retrieve_context(&args.user_id, &args.query)
        .await
        .context("Failed to retrieve context")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        print_context(&context);
    }
    Ok(())
}

/// Summarize buffered interactions now.
pub async fn summarize(user_id: &str, config: &Config) -> Result<()> {
    let fabric = open_fabric(config)?;
    match fabric
        .summarize_now(user_id)
        .await
        .context("Failed to summarize")?
    {
        Some(summary) => {
            println!("{} Archived summary {}", "✓".green(), summary.id.dimmed());
            println!("  {}", summary.text);
        }
        None => println!("{} Nothing new to summarize", "○".yellow()),
    }
    Ok(())
}

fn outcome_display(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Skipped => "skipped".dimmed().to_string(),
        StepOutcome::Completed => "done".green().to_string(),
        StepOutcome::Failed(e) => format!("{} ({})", "failed".red(), e),
    }
}

fn print_report(report: &WriteReport) {
    let mark = if report.is_complete() {
        "✓".green()
    } else {
        "⚠".yellow()
    };
    println!("{} Recorded interaction #{} for {}", mark, report.seq, report.user_id.cyan());
    println!("  Promotion:     {}", outcome_display(&report.promotion));
    println!("  Summarization: {}", outcome_display(&report.summarization));
}

fn print_context(context: &RetrievedContext) {
    if context.is_empty() {
        println!("{} No memories for this user", "⚠".yellow());
        return;
    }

    println!("{}", "Recent".cyan().bold());
    if context.recent.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for text in &context.recent {
        println!("  • {}", text);
    }
    println!();

    println!("{}", "Summaries".cyan().bold());
    if context.summaries.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for text in &context.summaries {
        println!("  • {}", text);
    }
    println!();

    println!("{}", "Semantic".cyan().bold());
    if context.semantic.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for hit in &context.semantic {
        println!(
            "  • {} {}",
            hit.text,
            format!(
                "(score {:.3}, similarity {:.3}, importance {:.3})",
                hit.score, hit.similarity, hit.importance
            )
            .dimmed()
        );
    }
}
