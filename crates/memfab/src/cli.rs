//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// memfab - tiered conversational memory
///
/// Buffers recent interactions, archives summaries of older ones and
/// keeps significant ones in a decaying semantic index, per user.
#[derive(Parser, Debug)]
#[command(name = "memfab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Semantic index directory (overrides config)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record an interaction for a user
    Add(AddArgs),

    /// Retrieve context for a query from all tiers
    Context(ContextArgs),

    /// Summarize buffered interactions into the archive now
    Summarize {
        /// User ID
        user_id: String,
    },

    /// Apply importance decay to semantic memories
    Decay(DecayArgs),

    /// Re-embed a user's semantic memories with the configured embedder
    Rebuild {
        /// User ID
        user_id: String,
    },

    /// Show per-tier counts for a user
    Stats {
        /// User ID
        user_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List users with semantic memories
    Users,

    /// Configuration file management
    Config(ConfigCommand),

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// User ID
    pub user_id: String,

    /// Interaction text
    pub text: String,

    /// Significance score; above the promotion threshold it is kept semantically
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub significance: f64,

    /// Output the write report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// User ID
    pub user_id: String,

    /// Query text
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DecayArgs {
    /// User ID (omit with --all)
    #[arg(required_unless_present = "all")]
    pub user_id: Option<String>,

    /// Decay every user with a semantic index
    #[arg(long, conflicts_with = "user_id")]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from(["memfab", "add", "alice", "hello there", "-s", "0.9"]).unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.user_id, "alice");
                assert_eq!(args.text, "hello there");
                assert_eq!(args.significance, 0.9);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_decay_requires_user_or_all() {
        assert!(Cli::try_parse_from(["memfab", "decay"]).is_err());
        assert!(Cli::try_parse_from(["memfab", "decay", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["memfab", "decay", "alice"]).is_ok());
        assert!(Cli::try_parse_from(["memfab", "decay", "alice", "--all"]).is_err());
    }

    #[test]
    fn test_global_paths() {
        let cli = Cli::try_parse_from(["memfab", "users", "--database", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
    }
}
