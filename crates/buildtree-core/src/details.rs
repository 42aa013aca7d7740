use crate::events::{EventResult, Failure};
use crate::node::{ExecutionNode, NodeId};

/// State of the detail panel showing the selected node's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailView {
    node: Option<NodeId>,
    text: Option<String>,
}

impl DetailView {
    /// Node currently shown, if it had anything to show.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Show `node` in the panel.
    ///
    /// Returns true when the node had details; otherwise the panel is reset
    /// to its empty state.
    pub(crate) fn show(&mut self, id: NodeId, node: &ExecutionNode, is_build_root: bool) -> bool {
        let text = if is_build_root { None } else { node_details(node) };
        match text {
            Some(text) => {
                self.node = Some(id);
                self.text = Some(text);
                true
            }
            None => {
                self.clear();
                false
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.node = None;
        self.text = None;
    }
}

/// Detail text for a node, derived from its result.
///
/// Failures print one block each, separated by a blank line. Message
/// results print their details. Anything else has nothing to show.
pub fn node_details(node: &ExecutionNode) -> Option<String> {
    match node.result()? {
        EventResult::Failure { failures } => failure_details(failures),
        EventResult::Message { details } => details.as_ref().filter(|d| !d.is_empty()).cloned(),
        EventResult::Success { .. } | EventResult::Skipped => None,
    }
}

fn failure_details(failures: &[Failure]) -> Option<String> {
    let blocks: Vec<String> = failures
        .iter()
        .filter_map(|failure| {
            let text = failure.text()?;
            let mut block = text.to_string();
            if let Some(ref error) = failure.error
                && error != text
            {
                block.push_str("\nCaused by: ");
                block.push_str(error);
            }
            Some(block)
        })
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}
