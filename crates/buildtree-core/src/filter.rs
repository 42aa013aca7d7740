use std::fmt;
use std::sync::Arc;

use crate::node::{ExecutionNode, ProblemKind};
use crate::{Error, Result};

type Predicate = dyn Fn(&ExecutionNode) -> bool + Send + Sync;

/// A predicate deciding which nodes are visible.
///
/// Cloning is cheap; the predicate is shared. The tree always ORs the
/// installed filter with "is the build-progress root", so a filter can never
/// hide the build itself.
#[derive(Clone)]
pub struct NodeFilter {
    label: String,
    predicate: Arc<Predicate>,
}

impl NodeFilter {
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&ExecutionNode) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Failed nodes, and nodes with a failed descendant.
    pub fn errors_only() -> Self {
        Self::new("errors-only", |node| {
            node.is_failed() || node.child_problem() == ProblemKind::Error
        })
    }

    /// Nodes that failed or carry warnings, directly or below them.
    pub fn problems_only() -> Self {
        Self::new("problems-only", |node| node.is_failed() || node.has_warnings())
    }

    /// Nodes whose display text matches a glob pattern.
    pub fn name_matches(pattern: &str) -> Result<Self> {
        let glob = glob::Pattern::new(pattern).map_err(|source| Error::FilterPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::new(format!("name:{pattern}"), move |node| {
            glob.matches(&node.display_text())
        }))
    }

    /// Visible when every filter accepts the node.
    pub fn all(filters: Vec<NodeFilter>) -> Self {
        let label = join_labels(&filters, " & ");
        Self::new(label, move |node| filters.iter().all(|f| f.test(node)))
    }

    /// Visible when any filter accepts the node.
    pub fn any(filters: Vec<NodeFilter>) -> Self {
        let label = join_labels(&filters, " | ");
        Self::new(label, move |node| filters.iter().any(|f| f.test(node)))
    }

    pub fn test(&self, node: &ExecutionNode) -> bool {
        (self.predicate)(node)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

fn join_labels(filters: &[NodeFilter], sep: &str) -> String {
    filters
        .iter()
        .map(|f| f.label.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeFilter").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventResult, Failure, MessageKind};

    fn node(name: &str) -> ExecutionNode {
        let mut node = ExecutionNode::new(None);
        node.name = name.to_string();
        node
    }

    #[test]
    fn test_errors_only() {
        let filter = NodeFilter::errors_only();

        let ok = node("ok");
        assert!(!filter.test(&ok));

        let mut failed = node("failed");
        failed.result = Some(EventResult::Failure {
            failures: vec![Failure::default()],
        });
        assert!(filter.test(&failed));

        let mut parent = node("parent");
        parent.report_child_problem(ProblemKind::Error);
        assert!(filter.test(&parent));

        let mut warned = node("warned");
        warned.report_child_problem(ProblemKind::Warning);
        assert!(!filter.test(&warned));
    }

    #[test]
    fn test_problems_only_includes_warnings() {
        let filter = NodeFilter::problems_only();
        let mut warning = node("unused import");
        warning.message_kind = Some(MessageKind::Warning);
        assert!(filter.test(&warning));
        assert!(!filter.test(&node("clean")));
    }

    #[test]
    fn test_name_matches_glob() {
        let filter = NodeFilter::name_matches(":compile*").unwrap();
        assert!(filter.test(&node(":compileJava")));
        assert!(!filter.test(&node(":test")));
        assert_eq!(filter.label(), "name::compile*");
    }

    #[test]
    fn test_combinators() {
        let compile = NodeFilter::name_matches("*compile*").unwrap();
        let errors = NodeFilter::errors_only();

        let mut failed_compile = node(":compileJava");
        failed_compile.message_kind = Some(MessageKind::Error);
        let plain_compile = node(":compileKotlin");

        let both = NodeFilter::all(vec![compile.clone(), errors.clone()]);
        assert!(both.test(&failed_compile));
        assert!(!both.test(&plain_compile));

        let either = NodeFilter::any(vec![compile, errors]);
        assert!(either.test(&plain_compile));
        assert!(!either.test(&node(":jar")));
        assert_eq!(format!("{either:?}"), "NodeFilter(\"name:*compile* | errors-only\")");
    }
}
