use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use buildtree_core::config::ViewConfig;
use buildtree_core::events::{EventResult, parse_event_stream};
use buildtree_core::invoker::TreeInvoker;
use buildtree_core::node::NodeStatus;
use buildtree_core::BuildTree;
use clap::Args;

use crate::cli::Verbosity;
use crate::render::{detail_lines, format_row, separator_line, spawn_renderer};

/// Arguments for the `replay` command
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON Lines event file, or `-` for stdin
    pub input: PathBuf,

    /// Config file (defaults to the nearest buildtree.yaml above the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show file paths relative to this directory
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Show only failed nodes and the nodes containing them
    #[arg(long)]
    pub errors_only: bool,

    /// Show only nodes with errors or warnings
    #[arg(long, conflicts_with = "errors_only")]
    pub problems_only: bool,

    /// Show only nodes whose text matches the glob pattern
    #[arg(long)]
    pub filter: Option<String>,

    /// Print failure details under each failed node instead of after the tree
    #[arg(long)]
    pub side_by_side: bool,

    /// Print the final tree as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Resolve the view config: explicit file, else discovered file, then CLI overrides.
fn resolve_config(args: &ReplayArgs) -> Result<ViewConfig> {
    let mut config = match args.config {
        Some(ref path) => ViewConfig::load(path)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            ViewConfig::find_and_load(&cwd)?
        }
    };

    if let Some(ref dir) = args.working_dir {
        config.working_dir = Some(dir.clone());
    }
    if args.errors_only {
        config.filter.errors_only = true;
    }
    if args.problems_only {
        config.filter.problems_only = true;
    }
    if args.side_by_side {
        config.side_by_side = true;
    }
    if let Some(ref pattern) = args.filter {
        config.filter.name = Some(pattern.clone());
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read events from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read events from {}", path.display()))
    }
}

/// Render the final tree with the details of failed nodes.
///
/// With `side_by_side`, each failed node's details follow its row;
/// otherwise they are printed after the tree under a separator.
fn tree_lines(tree: &mut BuildTree, side_by_side: bool, with_details: bool) -> Vec<String> {
    let snapshot = tree.snapshot();
    let mut lines = Vec::new();
    let mut trailing = Vec::new();

    for row in &snapshot.rows {
        lines.push(format_row(row));
        if !with_details || row.status != NodeStatus::Failed || !tree.select(row.node) {
            continue;
        }
        let Some(text) = tree.detail().text() else {
            continue;
        };
        if side_by_side {
            lines.extend(detail_lines(text, row.depth + 1));
        } else {
            trailing.push(String::new());
            trailing.push(separator_line(&row.text));
            trailing.extend(text.lines().map(str::to_string));
        }
    }

    lines.extend(trailing);
    lines
}

/// Replay an event stream through the tree and render the result.
///
/// Fails when the build finished with a failure result.
pub async fn run(args: ReplayArgs, verbosity: Verbosity) -> Result<()> {
    let config = resolve_config(&args)?;
    let input = read_input(&args.input)?;
    let events = parse_event_stream(&input)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    tracing::debug!("replaying {} events", events.len());

    let tree = BuildTree::from_config(&config)?;
    let (signal_tx, renderer) = spawn_renderer(verbosity);
    let invoker = TreeInvoker::spawn(tree, signal_tx);
    for event in events {
        invoker.on_event(event)?;
    }
    let mut tree = invoker.shutdown().await?;
    let stats = renderer.await.context("Renderer task failed")?;
    tracing::debug!(
        "{} signals coalesced into {} refresh passes",
        stats.signals,
        stats.passes
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree.snapshot())?);
    } else {
        let with_details = verbosity != Verbosity::Quiet;
        for line in tree_lines(&mut tree, config.side_by_side, with_details) {
            println!("{line}");
        }
    }

    let build_failed = tree
        .node(tree.build_root())
        .and_then(|node| node.result())
        .is_some_and(|result| matches!(result, EventResult::Failure { .. }));
    if build_failed {
        bail!("build failed");
    }
    Ok(())
}
