use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::events::{EventResult, Location, MessageKind};

/// Handle to a node in the tree's arena.
///
/// Handles are only meaningful for the tree that issued them, and become
/// stale after [`BuildTree::clear`](crate::tree::BuildTree::clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Worst severity observed among a node's descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    #[default]
    None,
    Warning,
    Error,
}

impl ProblemKind {
    /// Map a message severity onto the problem scale. Only errors and
    /// warnings count as problems.
    pub fn from_message(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Error => ProblemKind::Error,
            MessageKind::Warning => ProblemKind::Warning,
            _ => ProblemKind::None,
        }
    }
}

/// Rendering status derived from a node's timing and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    Running,
    Success,
    UpToDate,
    Skipped,
    Failed,
    Warning,
    Info,
}

/// One entry in the displayed build/task hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ExecutionNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) name: String,
    pub(crate) title: Option<String>,
    pub(crate) hint: Option<String>,
    pub(crate) start_time: u64,
    pub(crate) end_time: u64,
    pub(crate) result: Option<EventResult>,
    pub(crate) navigatable: Option<Location>,
    pub(crate) auto_expand: bool,
    pub(crate) child_problem: ProblemKind,
    pub(crate) message_kind: Option<MessageKind>,
    pub(crate) icon: Option<String>,
}

impl ExecutionNode {
    pub(crate) fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// All children in insertion order, ignoring any filter.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Text shown for the node: `"title: name"` when a title is set.
    pub fn display_text(&self) -> String {
        match (self.title.as_deref(), self.name.is_empty()) {
            (Some(title), false) if !title.is_empty() => format!("{title}: {}", self.name),
            (Some(title), true) => title.to_string(),
            _ => self.name.clone(),
        }
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn end_time(&self) -> u64 {
        self.end_time
    }

    pub fn result(&self) -> Option<&EventResult> {
        self.result.as_ref()
    }

    pub fn navigatable(&self) -> Option<&Location> {
        self.navigatable.as_ref()
    }

    pub fn is_auto_expand(&self) -> bool {
        self.auto_expand
    }

    pub fn child_problem(&self) -> ProblemKind {
        self.child_problem
    }

    pub fn message_kind(&self) -> Option<MessageKind> {
        self.message_kind
    }

    /// File extension for file grouping nodes, used by renderers to pick a glyph.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Escalate the aggregated child problem kind. Never downgrades.
    pub(crate) fn report_child_problem(&mut self, kind: ProblemKind) {
        self.child_problem = self.child_problem.max(kind);
    }

    pub fn is_running(&self) -> bool {
        self.end_time == 0 && self.result.is_none()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.result, Some(EventResult::Failure { .. }))
            || self.message_kind == Some(MessageKind::Error)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.result, Some(EventResult::Skipped))
    }

    pub fn has_warnings(&self) -> bool {
        self.child_problem >= ProblemKind::Warning
            || self.message_kind == Some(MessageKind::Warning)
    }

    pub fn status(&self) -> NodeStatus {
        if self.is_failed() {
            return NodeStatus::Failed;
        }
        match (&self.result, self.message_kind) {
            (_, Some(MessageKind::Warning)) => NodeStatus::Warning,
            (_, Some(_)) => NodeStatus::Info,
            (Some(EventResult::Skipped), _) => NodeStatus::Skipped,
            (Some(EventResult::Success { up_to_date: true }), _) => NodeStatus::UpToDate,
            (Some(_), _) => NodeStatus::Success,
            (None, _) if self.end_time != 0 => NodeStatus::Success,
            (None, _) => NodeStatus::Running,
        }
    }

    /// Elapsed time; measured against the wall clock while still running.
    pub fn duration(&self) -> Option<Duration> {
        if self.start_time == 0 {
            return None;
        }
        let end = if self.end_time != 0 {
            self.end_time
        } else {
            now_millis()
        };
        Some(Duration::from_millis(end.saturating_sub(self.start_time)))
    }

    /// Human-readable duration, or `None` for message nodes and unstarted nodes.
    pub fn duration_text(&self) -> Option<String> {
        if self.message_kind.is_some() {
            return None;
        }
        self.duration().map(format_duration)
    }
}

/// Format a duration the way the tree renders it: `"120 ms"`, `"2.5 s"`, `"1 m 4 s"`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{millis} ms")
    } else if millis < 60_000 {
        format!("{:.1} s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{} m {} s", secs / 60, secs % 60)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Failure;

    #[test]
    fn test_now_millis_is_epoch_millis() {
        // 2020-09-13 in epoch milliseconds.
        assert!(now_millis() > 1_600_000_000_000);
        assert!(now_millis() < u64::MAX);
    }

    #[test]
    fn test_problem_kind_ordering() {
        assert!(ProblemKind::Error > ProblemKind::Warning);
        assert!(ProblemKind::Warning > ProblemKind::None);
        assert_eq!(
            ProblemKind::from_message(MessageKind::Info),
            ProblemKind::None
        );
    }

    #[test]
    fn test_report_child_problem_never_downgrades() {
        let mut node = ExecutionNode::new(None);
        node.report_child_problem(ProblemKind::Error);
        node.report_child_problem(ProblemKind::Warning);
        node.report_child_problem(ProblemKind::None);
        assert_eq!(node.child_problem(), ProblemKind::Error);
    }

    #[test]
    fn test_display_text_with_title() {
        let mut node = ExecutionNode::new(None);
        node.name = "running".to_string();
        assert_eq!(node.display_text(), "running");
        node.title = Some("Build".to_string());
        assert_eq!(node.display_text(), "Build: running");
        node.name.clear();
        assert_eq!(node.display_text(), "Build");
    }

    #[test]
    fn test_status_from_result() {
        let mut node = ExecutionNode::new(None);
        node.start_time = 10;
        assert_eq!(node.status(), NodeStatus::Running);
        assert!(node.is_running());

        node.end_time = 20;
        node.result = Some(EventResult::Success { up_to_date: true });
        assert_eq!(node.status(), NodeStatus::UpToDate);

        node.result = Some(EventResult::Failure {
            failures: vec![Failure::default()],
        });
        assert_eq!(node.status(), NodeStatus::Failed);
        assert!(node.is_failed());
    }

    #[test]
    fn test_message_status_and_no_duration() {
        let mut node = ExecutionNode::new(None);
        node.start_time = 5;
        node.end_time = 5;
        node.message_kind = Some(MessageKind::Warning);
        assert_eq!(node.status(), NodeStatus::Warning);
        assert!(node.has_warnings());
        assert_eq!(node.duration_text(), None);
    }

    #[test]
    fn test_duration_of_finished_node() {
        let mut node = ExecutionNode::new(None);
        assert_eq!(node.duration(), None);
        node.start_time = 1_000;
        node.end_time = 3_500;
        assert_eq!(node.duration(), Some(Duration::from_millis(2_500)));
        assert_eq!(node.duration_text().as_deref(), Some("2.5 s"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(120)), "120 ms");
        assert_eq!(format_duration(Duration::from_millis(1_300)), "1.3 s");
        assert_eq!(format_duration(Duration::from_secs(64)), "1 m 4 s");
    }
}
