use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ViewConfig;
use crate::details::DetailView;
use crate::events::{
    BuildEvent, EventId, EventKind, EventResult, Location, MessageEvent, MessageKind,
};
use crate::filter::NodeFilter;
use crate::node::{ExecutionNode, NodeId, ProblemKind};
use crate::Result;

const ROOT: NodeId = NodeId(0);
const BUILD_ROOT: NodeId = NodeId(1);

/// Key of the identity map.
///
/// Producer ids and synthetic grouping keys live in separate variants so a
/// producer can never collide with a grouping node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Event(EventId),
    /// Per-file message grouping node under `parent`.
    Group {
        group: String,
        parent: EventId,
        file: String,
    },
}

/// Notifications for the presentation layer, drained with
/// [`BuildTree::take_signals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSignal {
    /// Re-render `node` and its subtree.
    Invalidate { node: NodeId },
    /// Re-render the whole tree.
    InvalidateAll,
    /// Show `node` in the detail panel.
    Select { node: NodeId },
    /// Jump to the first error. Emitted at most once per tree.
    Navigate { location: Location },
    /// Install the tree's context menu with these restart actions.
    InstallContextMenu { restart_actions: Vec<String> },
}

/// Folds build events into a tree of [`ExecutionNode`]s.
///
/// Nodes live in an arena; parent and child links are [`NodeId`]s. The
/// synthetic root always owns exactly one child, the build-progress root,
/// which `StartBuild` events take over instead of creating a node.
///
/// The reducer never fails. Malformed or out-of-order events are logged and
/// dropped so the rest of the stream is still processed.
#[derive(Debug)]
pub struct BuildTree {
    nodes: Vec<ExecutionNode>,
    index: HashMap<NodeKey, NodeId>,
    working_dir: Option<PathBuf>,
    filter: Option<NodeFilter>,
    navigate_to_first_error: bool,
    /// One-shot latch for the first-error navigation; never reset.
    shown_first_error: AtomicBool,
    context_menu_installed: bool,
    detail: DetailView,
    expanded: HashSet<NodeId>,
    signals: Vec<TreeSignal>,
}

impl BuildTree {
    /// Create an empty tree. File paths in messages are shown relative to
    /// `working_dir` when they lie under it.
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            working_dir,
            filter: None,
            navigate_to_first_error: true,
            shown_first_error: AtomicBool::new(false),
            context_menu_installed: false,
            detail: DetailView::default(),
            expanded: HashSet::new(),
            signals: Vec::new(),
        };
        tree.reset_roots();
        tree
    }

    /// Create a tree configured from a `buildtree.yaml`.
    pub fn from_config(config: &ViewConfig) -> Result<Self> {
        let mut tree = Self::new(config.working_dir.clone());
        tree.navigate_to_first_error = config.navigate_to_first_error;
        if let Some(filter) = config.filter.to_filter()? {
            tree.set_filter(Some(filter));
        }
        Ok(tree)
    }

    pub fn set_navigate_to_first_error(&mut self, enabled: bool) {
        self.navigate_to_first_error = enabled;
    }

    fn reset_roots(&mut self) {
        let mut root = ExecutionNode::new(None);
        root.auto_expand = true;
        root.children.push(BUILD_ROOT);
        let mut build_root = ExecutionNode::new(Some(ROOT));
        build_root.auto_expand = true;
        self.nodes.clear();
        self.nodes.push(root);
        self.nodes.push(build_root);
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn build_root(&self) -> NodeId {
        BUILD_ROOT
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn node(&self, id: NodeId) -> Option<&ExecutionNode> {
        self.nodes.get(id.0)
    }

    /// Node created for a producer event id.
    pub fn lookup(&self, id: &EventId) -> Option<NodeId> {
        self.index.get(&NodeKey::Event(id.clone())).copied()
    }

    pub fn lookup_key(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Number of entries in the identity map.
    pub fn mapped_len(&self) -> usize {
        self.index.len()
    }

    /// Number of nodes, including the two structural roots.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn detail(&self) -> &DetailView {
        &self.detail
    }

    pub fn filter(&self) -> Option<&NodeFilter> {
        self.filter.as_ref()
    }

    /// Drain the notifications produced since the last call.
    pub fn take_signals(&mut self) -> Vec<TreeSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Process one event.
    pub fn handle(&mut self, event: &BuildEvent) {
        let parent = self.resolve_parent(event);
        let key = NodeKey::Event(event.id.clone());

        let current = match event.kind {
            EventKind::StartBuild { .. } | EventKind::Start | EventKind::Message(_) => {
                if let Some(existing) = self.index.get(&key) {
                    tracing::warn!(
                        "start event id collision found: {}, was also in node: {}",
                        event.id,
                        self.nodes[existing.0].display_text()
                    );
                    return;
                }
                let Some(id) = self.create_node(event, parent) else {
                    return;
                };
                self.index.insert(key, id);
                id
            }
            EventKind::Progress { .. } => match self.index.get(&key) {
                Some(id) => *id,
                None => {
                    // Progress may arrive before its own start event.
                    let Some(parent) = parent else {
                        tracing::warn!(
                            "dropping progress event {}: parent {:?} is unknown",
                            event.id,
                            event.parent_id
                        );
                        return;
                    };
                    let id = self.add_node(parent);
                    self.index.insert(key, id);
                    id
                }
            },
            EventKind::Finish { .. } | EventKind::FinishBuild { .. } => match self.index.get(&key) {
                Some(id) => *id,
                None => {
                    tracing::warn!("dropping finish event {}: no node with that id", event.id);
                    return;
                }
            },
        };

        let node = &mut self.nodes[current.0];
        node.name = event.message.clone();
        node.hint = event.hint.clone();
        if node.start_time == 0 {
            node.start_time = event.time;
        }

        if let Some(result) = event.kind.result() {
            node.end_time = event.time;
            node.result = Some(result.clone());
        }

        if let EventKind::FinishBuild { .. } = event.kind {
            let time = format_timestamp(event.time);
            node.hint = Some(match event.hint.as_deref() {
                Some(hint) => format!("{hint} at {time}"),
                None => format!("at {time}"),
            });
            if self.detail.node().is_none() {
                self.signals.push(TreeSignal::Select { node: BUILD_ROOT });
                self.select(BUILD_ROOT);
            }
        }

        self.schedule_update(current);
    }

    /// Look up the event's parent; for messages, also resolve the grouping
    /// node chain and propagate the message severity to the ancestors.
    fn resolve_parent(&mut self, event: &BuildEvent) -> Option<NodeId> {
        let parent = event.parent_id.as_ref().and_then(|id| self.lookup(id));
        match event.kind {
            EventKind::Message(ref message) => self.message_parent(event, message, parent),
            _ => parent,
        }
    }

    fn message_parent(
        &mut self,
        event: &BuildEvent,
        message: &MessageEvent,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let parent_id = event.parent_id.as_ref()?;
        let mut parent = parent?;

        if let Some(ref position) = message.file {
            let file = normalize_path(&position.path);
            let key = NodeKey::Group {
                group: message.group.clone(),
                parent: parent_id.clone(),
                file: file.clone(),
            };
            parent = match self.index.get(&key) {
                Some(id) => *id,
                None => {
                    let id = self.add_node(parent);
                    let name = self.display_path(&position.path, &file);
                    let node = &mut self.nodes[id.0];
                    node.name = name;
                    node.auto_expand = true;
                    node.start_time = event.time;
                    node.end_time = event.time;
                    node.icon = position
                        .path
                        .extension()
                        .map(|ext| ext.to_string_lossy().into_owned());
                    node.navigatable = message.navigatable();
                    self.index.insert(key, id);
                    id
                }
            };
        }

        let problem = ProblemKind::from_message(message.severity);
        if problem != ProblemKind::None {
            let mut cursor = Some(parent);
            while let Some(id) = cursor {
                let node = &mut self.nodes[id.0];
                node.report_child_problem(problem);
                cursor = node.parent;
            }
            self.signals.push(TreeSignal::InvalidateAll);
        }
        Some(parent)
    }

    /// Create the node for a start or message event.
    fn create_node(&mut self, event: &BuildEvent, parent: Option<NodeId>) -> Option<NodeId> {
        if let EventKind::StartBuild {
            ref title,
            ref restart_actions,
        } = event.kind
        {
            if !self.context_menu_installed {
                self.context_menu_installed = true;
                self.signals.push(TreeSignal::InstallContextMenu {
                    restart_actions: restart_actions.clone(),
                });
            }
            let node = &mut self.nodes[BUILD_ROOT.0];
            node.title = Some(title.clone());
            node.auto_expand = true;
            return Some(BUILD_ROOT);
        }

        let Some(parent) = parent else {
            tracing::warn!(
                "dropping event {}: parent {:?} is unknown",
                event.id,
                event.parent_id
            );
            return None;
        };

        let id = self.add_node(parent);
        if let EventKind::Message(ref message) = event.kind {
            let location = message.navigatable();
            let node = &mut self.nodes[id.0];
            node.start_time = event.time;
            node.end_time = event.time;
            node.navigatable = location.clone();
            node.message_kind = Some(message.severity);
            node.result = Some(EventResult::Message {
                details: message.details.clone(),
            });
            if message.severity == MessageKind::Error
                && let Some(location) = location
                && self.navigate_to_first_error
                && self
                    .shown_first_error
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                self.signals.push(TreeSignal::Navigate { location });
            }
        }
        self.nodes[id.0].auto_expand = parent == BUILD_ROOT;
        Some(id)
    }

    fn add_node(&mut self, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ExecutionNode::new(Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Name of a file grouping node: relative to the working directory when
    /// the file lies under it, otherwise the absolute path.
    fn display_path(&self, path: &Path, normalized: &str) -> String {
        self.working_dir
            .as_deref()
            .and_then(|dir| path.strip_prefix(dir).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(normalize_path)
            .unwrap_or_else(|| normalized.to_string())
    }

    /// Request a re-render of the node's parent (or the node itself when
    /// parentless), then expand auto-expanding ancestors.
    fn schedule_update(&mut self, id: NodeId) {
        let target = self.nodes[id.0].parent.unwrap_or(id);
        self.signals.push(TreeSignal::Invalidate { node: target });
        self.expand_auto();
    }

    /// Expand every node reachable from the root through auto-expanding
    /// nodes that have children. Subtrees below other nodes are skipped.
    fn expand_auto(&mut self) {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.auto_expand && !node.children.is_empty() {
                self.expanded.insert(id);
                stack.extend(node.children.iter().copied());
            }
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    /// Install or clear the node filter. The build-progress root is always
    /// visible regardless of the filter.
    pub fn set_filter(&mut self, filter: Option<NodeFilter>) {
        self.filter = filter;
        self.signals.push(TreeSignal::InvalidateAll);
        self.expand_auto();
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        if id == ROOT || id == BUILD_ROOT {
            return true;
        }
        match (&self.filter, self.nodes.get(id.0)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(filter), Some(node)) => filter.test(node),
        }
    }

    /// Children of `id` that pass the filter, in insertion order.
    pub fn visible_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id.0)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|child| self.is_visible(*child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Show a node in the detail panel. Returns true when it had details.
    pub fn select(&mut self, id: NodeId) -> bool {
        match self.nodes.get(id.0) {
            Some(node) => self.detail.show(id, node, id == BUILD_ROOT),
            None => false,
        }
    }

    /// Discard every node except the two structural roots.
    pub fn clear(&mut self) {
        self.reset_roots();
        self.index.clear();
        self.detail.clear();
        self.expanded.clear();
        self.signals.push(TreeSignal::InvalidateAll);
        self.expand_auto();
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Format an epoch-millisecond timestamp in local time.
pub fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}
