mod cli;
mod commands;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Verbosity};
use colored::Colorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // Held until exit so buffered file logs are flushed.
    let log_guard = logging::init(verbosity, cli.log_dir.as_deref());

    let result = match cli.command {
        Commands::Replay(args) => commands::replay::run(args, verbosity).await,
        Commands::Completion(args) => {
            clap_complete::generate(
                args.shell,
                &mut <Cli as clap::CommandFactory>::command(),
                "buildtree",
                &mut std::io::stdout(),
            );
            return Ok(());
        }
    };

    match result {
        Ok(()) => {
            if verbosity != Verbosity::Quiet {
                eprintln!("\n{}", "SUCCESS".green().bold());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("\n{} {:#}", "FAILED".red().bold(), e);
            // `exit` skips destructors; flush file logs first.
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
