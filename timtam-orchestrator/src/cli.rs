//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Grasp orchestrator worker
///
/// Schedules LLM facilitator judgments for live meetings.
#[derive(Parser, Debug)]
#[command(name = "timtam-orchestrator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Worker configuration file (TOML)
    #[arg(long, global = true, env = "TIMTAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker and its HTTP surface (default)
    Serve {
        /// Override the listen address
        #[arg(long)]
        listen: Option<String>,
    },

    /// Validate a Grasp group file and print its Grasps
    Validate {
        /// Path to the Grasp group document
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["timtam-orchestrator"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json_logs);
    }

    #[test]
    fn test_validate_takes_file() {
        let cli = Cli::try_parse_from(["timtam-orchestrator", "validate", "grasps.toml"]).unwrap();
        match cli.command {
            Some(Commands::Validate { file }) => assert_eq!(file, PathBuf::from("grasps.toml")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "timtam-orchestrator",
            "serve",
            "--listen",
            "0.0.0.0:9000",
            "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { listen: Some(ref addr) }) if addr == "0.0.0.0:9000"
        ));
    }
}
