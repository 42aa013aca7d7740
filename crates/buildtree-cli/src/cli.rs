use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::replay::ReplayArgs;

/// buildtree: fold build event streams into an execution tree
///
/// Replays recorded build/task lifecycle events and renders the resulting
/// tree of tasks, messages and failures.
#[derive(Parser, Debug)]
#[command(name = "buildtree", version, about, long_about = None)]
pub struct Cli {
    /// Increase output verbosity (show debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a daily-rotated file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Verbosity level resolved from --verbose / --quiet flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// --quiet: only errors and essential output
    Quiet,
    /// default: normal output
    Normal,
    /// --verbose: extra debug info
    Verbose,
}

impl Cli {
    /// Resolve the verbosity level from CLI flags
    pub fn verbosity(&self) -> Verbosity {
        match (self.quiet, self.verbose) {
            (true, _) => Verbosity::Quiet,
            (_, true) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON Lines event stream and render the resulting tree
    Replay(ReplayArgs),

    /// Generate shell completions
    Completion(CompletionArgs),
}

/// Arguments for the `completion` command
#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::parse_from(["buildtree", "-v", "replay", "events.jsonl"]);
        assert_eq!(cli.verbosity(), Verbosity::Verbose);
        let cli = Cli::parse_from(["buildtree", "replay", "events.jsonl", "--quiet"]);
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
        let cli = Cli::parse_from(["buildtree", "replay", "events.jsonl"]);
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["buildtree", "-v", "-q", "replay", "x"]).is_err());
    }

    #[test]
    fn test_replay_args() {
        let cli = Cli::parse_from([
            "buildtree",
            "replay",
            "-",
            "--errors-only",
            "--filter",
            "compile*",
            "--json",
        ]);
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.input, PathBuf::from("-"));
                assert!(args.errors_only);
                assert_eq!(args.filter.as_deref(), Some("compile*"));
                assert!(args.json);
            }
            other => panic!("expected replay, got {other:?}"),
        }
    }
}
