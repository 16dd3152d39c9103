//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

use super::{build_embedder, open_fabric};

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "memfab Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check configuration values
    print!("  Settings: ");
    match config.fabric.validate() {
        Ok(()) => println!("{}", "✓ valid".green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Invalid fabric settings");
        }
    }

    // Check embedder
    print!("  Embedder: ");
    match build_embedder(config) {
        Ok(embedder) => println!(
            "{}",
            format!("✓ {} ({} dimensions)", embedder.model_name(), embedder.dimension()).green()
        ),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Embedder unavailable");
        }
    }

    // Check database and index directory
    print!("  Database ({}): ", config.paths.database.display());
    match open_fabric(config) {
        Ok(fabric) => {
            println!("{}", "✓ connected".green());
            print!("  Semantic index ({}): ", config.fabric.index_dir.display());
            match fabric.known_users() {
                Ok(users) => println!("{}", format!("✓ {} users", users.len()).green()),
                Err(e) => {
                    println!("{}", format!("✗ {}", e).red());
                    issues.push("Cannot read semantic index directory");
                }
            }
        }
        Err(e) => {
            println!("{}", format!("✗ {:#}", e).red());
            issues.push("Cannot open memory fabric");
        }
    }

    println!();
    if issues.is_empty() {
        println!("{}", "All checks passed".green().bold());
    } else {
        println!("{}", format!("{} issue(s) found:", issues.len()).yellow().bold());
        for issue in issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
