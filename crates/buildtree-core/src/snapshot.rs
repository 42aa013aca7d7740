use serde::Serialize;

use crate::events::Location;
use crate::node::{NodeId, NodeStatus, ProblemKind};
use crate::tree::BuildTree;

/// One visible row of the tree, in depth-first order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub node: NodeId,
    pub depth: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub child_problem: ProblemKind,
    pub expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Immutable copy of the visible tree, safe to hand to a rendering task
/// while the reducer keeps mutating the live tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshot {
    pub rows: Vec<SnapshotRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TreeSnapshot {
    pub fn row(&self, node: NodeId) -> Option<&SnapshotRow> {
        self.rows.iter().find(|row| row.node == node)
    }
}

impl BuildTree {
    /// Capture every visible node below the synthetic root.
    ///
    /// The synthetic root itself is not a row; the build-progress root is
    /// always the first row at depth 0.
    pub fn snapshot(&self) -> TreeSnapshot {
        let mut rows = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self
            .visible_children(self.root())
            .into_iter()
            .rev()
            .map(|id| (id, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            rows.push(SnapshotRow {
                node: id,
                depth,
                text: node.display_text(),
                hint: node.hint().map(str::to_string),
                status: node.status(),
                duration: node.duration_text(),
                child_problem: node.child_problem(),
                expanded: self.is_expanded(id),
                location: node.navigatable().cloned(),
                icon: node.icon().map(str::to_string),
            });
            stack.extend(
                self.visible_children(id)
                    .into_iter()
                    .rev()
                    .map(|child| (child, depth + 1)),
            );
        }

        TreeSnapshot {
            rows,
            selected: self.detail().node(),
            details: self.detail().text().map(str::to_string),
        }
    }
}
