use buildtree_core::invoker::next_render_batch;
use buildtree_core::node::{NodeStatus, ProblemKind};
use buildtree_core::snapshot::SnapshotRow;
use buildtree_core::TreeSignal;
use colored::{ColoredString, Colorize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cli::Verbosity;

/// Width (in characters) of the separator line drawn around detail blocks.
const SEPARATOR_WIDTH: usize = 60;

/// Counters collected by the render loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Refresh passes after coalescing.
    pub passes: usize,
    /// Raw signals received from the tree.
    pub signals: usize,
}

/// Spawn a renderer task consuming tree signals.
///
/// Returns the signal sender to hand to the invoker and a join handle.
/// The loop ends when every sender is dropped.
pub fn spawn_renderer(
    verbosity: Verbosity,
) -> (mpsc::UnboundedSender<TreeSignal>, JoinHandle<RenderStats>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move { render_loop(rx, verbosity).await });
    (tx, handle)
}

async fn render_loop(
    mut rx: mpsc::UnboundedReceiver<TreeSignal>,
    verbosity: Verbosity,
) -> RenderStats {
    let mut stats = RenderStats::default();

    while let Some(batch) = next_render_batch(&mut rx).await {
        stats.passes += 1;
        stats.signals += batch.merged;

        if let Some(ref location) = batch.navigate
            && verbosity != Verbosity::Quiet
        {
            eprintln!("{} {}", "first error at".red().bold(), location);
        }
        if let Some(ref actions) = batch.context_menu
            && !actions.is_empty()
        {
            tracing::debug!("restart actions: {}", actions.join(", "));
        }
        tracing::trace!(
            "refresh pass: all={} nodes={:?} selected={:?}",
            batch.invalidate_all,
            batch.nodes,
            batch.selected
        );
    }

    stats
}

/// Marker shown in front of a node for its status.
fn status_marker(status: NodeStatus) -> ColoredString {
    match status {
        NodeStatus::Running => "…".cyan(),
        NodeStatus::Success => "✓".green(),
        NodeStatus::UpToDate => "✓".dimmed(),
        NodeStatus::Skipped => "-".dimmed(),
        NodeStatus::Failed => "✗".red().bold(),
        NodeStatus::Warning => "!".yellow().bold(),
        NodeStatus::Info => "i".blue(),
    }
}

/// Format one row: indentation, marker, text, then dimmed hint and duration.
pub fn format_row(row: &SnapshotRow) -> String {
    let indent = "  ".repeat(row.depth);
    let text = match (row.status, row.child_problem) {
        (NodeStatus::Failed, _) | (_, ProblemKind::Error) => row.text.red(),
        (_, ProblemKind::Warning) => row.text.yellow(),
        _ if row.depth == 0 => row.text.bold(),
        _ => row.text.normal(),
    };

    let mut line = format!("{indent}{} {text}", status_marker(row.status));
    if let Some(ref hint) = row.hint {
        line.push_str(&format!("  {}", hint.dimmed()));
    }
    if let Some(ref duration) = row.duration {
        line.push_str(&format!("  {}", duration.dimmed()));
    }
    line
}

/// Detail text shown under a row, indented one level below it.
pub fn detail_lines(text: &str, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth);
    text.lines()
        .map(|line| format!("{indent}{} {line}", "│".dimmed()))
        .collect()
}

/// Build a separator line: `─── label ─────────────────`
pub fn separator_line(label: &str) -> String {
    let label = format!(" {} ", label);
    let prefix_dashes = 3;
    let suffix_dashes = SEPARATOR_WIDTH.saturating_sub(prefix_dashes + label.chars().count());
    format!(
        "{}{}{}",
        "─".repeat(prefix_dashes).red(),
        label.red().bold(),
        "─".repeat(suffix_dashes).red(),
    )
}
