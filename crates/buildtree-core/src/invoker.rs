use std::collections::BTreeSet;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::events::{BuildEvent, Location};
use crate::filter::NodeFilter;
use crate::node::NodeId;
use crate::snapshot::TreeSnapshot;
use crate::tree::{BuildTree, TreeSignal};
use crate::{Error, Result};

/// Work items for the tree task, applied strictly in arrival order.
#[derive(Debug)]
pub enum TreeCommand {
    Event(Box<BuildEvent>),
    Clear,
    SetFilter(Option<NodeFilter>),
    Select(NodeId),
    Snapshot(oneshot::Sender<TreeSnapshot>),
}

/// Cloneable sender side of the tree task.
///
/// Producers on any task hand events to the tree through this handle; the
/// tree task processes them one at a time, in the order they were sent.
#[derive(Debug, Clone)]
pub struct TreeHandle {
    tx: UnboundedSender<TreeCommand>,
}

impl TreeHandle {
    fn send(&self, command: TreeCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::InvokerClosed)
    }

    pub fn on_event(&self, event: BuildEvent) -> Result<()> {
        self.send(TreeCommand::Event(Box::new(event)))
    }

    pub fn clear(&self) -> Result<()> {
        self.send(TreeCommand::Clear)
    }

    pub fn set_filter(&self, filter: Option<NodeFilter>) -> Result<()> {
        self.send(TreeCommand::SetFilter(filter))
    }

    pub fn select(&self, node: NodeId) -> Result<()> {
        self.send(TreeCommand::Select(node))
    }

    /// Snapshot of the tree after every command sent before this call.
    pub async fn snapshot(&self) -> Result<TreeSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(TreeCommand::Snapshot(reply))?;
        rx.await.map_err(|_| Error::InvokerClosed)
    }
}

/// Owns the tree task: the single serialization point for tree mutations.
pub struct TreeInvoker {
    handle: TreeHandle,
    task: JoinHandle<BuildTree>,
}

impl TreeInvoker {
    /// Move `tree` into a dedicated task. Signals produced by each command
    /// are forwarded to `signals`; a closed signal channel is ignored.
    pub fn spawn(tree: BuildTree, signals: UnboundedSender<TreeSignal>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(tree, rx, signals));
        Self {
            handle: TreeHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> TreeHandle {
        self.handle.clone()
    }

    pub fn on_event(&self, event: BuildEvent) -> Result<()> {
        self.handle.on_event(event)
    }

    pub async fn snapshot(&self) -> Result<TreeSnapshot> {
        self.handle.snapshot().await
    }

    /// Stop accepting commands and return the tree once every queued command
    /// has been applied. Waits for all cloned [`TreeHandle`]s to be dropped.
    pub async fn shutdown(self) -> Result<BuildTree> {
        drop(self.handle);
        Ok(self.task.await?)
    }
}

async fn run(
    mut tree: BuildTree,
    mut rx: UnboundedReceiver<TreeCommand>,
    signals: UnboundedSender<TreeSignal>,
) -> BuildTree {
    while let Some(command) = rx.recv().await {
        match command {
            TreeCommand::Event(event) => tree.handle(&event),
            TreeCommand::Clear => tree.clear(),
            TreeCommand::SetFilter(filter) => tree.set_filter(filter),
            TreeCommand::Select(node) => {
                if tree.select(node) {
                    let _ = signals.send(TreeSignal::Select { node });
                }
            }
            TreeCommand::Snapshot(reply) => {
                let _ = reply.send(tree.snapshot());
            }
        }
        for signal in tree.take_signals() {
            let _ = signals.send(signal);
        }
    }
    tracing::debug!("tree invoker stopped after {} nodes", tree.node_count());
    tree
}

/// Signals coalesced into one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBatch {
    /// Re-render everything; `nodes` is empty when set.
    pub invalidate_all: bool,
    pub nodes: BTreeSet<NodeId>,
    /// Last selection requested in this batch.
    pub selected: Option<NodeId>,
    pub navigate: Option<Location>,
    pub context_menu: Option<Vec<String>>,
    /// Number of raw signals folded into this batch.
    pub merged: usize,
}

impl RenderBatch {
    fn absorb(&mut self, signal: TreeSignal) {
        self.merged += 1;
        match signal {
            TreeSignal::Invalidate { node } => {
                if !self.invalidate_all {
                    self.nodes.insert(node);
                }
            }
            TreeSignal::InvalidateAll => {
                self.invalidate_all = true;
                self.nodes.clear();
            }
            TreeSignal::Select { node } => self.selected = Some(node),
            TreeSignal::Navigate { location } => {
                self.navigate.get_or_insert(location);
            }
            TreeSignal::InstallContextMenu { restart_actions } => {
                self.context_menu = Some(restart_actions);
            }
        }
    }
}

/// Wait for the next signal, then fold in every signal already queued.
///
/// Returns `None` once the signal channel is closed and drained.
pub async fn next_render_batch(rx: &mut UnboundedReceiver<TreeSignal>) -> Option<RenderBatch> {
    let first = rx.recv().await?;
    let mut batch = RenderBatch::default();
    batch.absorb(first);
    while let Ok(signal) = rx.try_recv() {
        batch.absorb(signal);
    }
    Some(batch)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::events::{EventKind, EventResult, FilePosition, MessageEvent, MessageKind};

    fn event(id: &str, parent: Option<&str>, time: u64, kind: EventKind) -> BuildEvent {
        BuildEvent {
            id: id.into(),
            parent_id: parent.map(Into::into),
            time,
            message: id.to_string(),
            hint: None,
            kind,
        }
    }

    fn build_start() -> BuildEvent {
        event(
            "b",
            None,
            1,
            EventKind::StartBuild {
                title: "Build".to_string(),
                restart_actions: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_events_from_another_task_are_applied_in_order() {
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let invoker = TreeInvoker::spawn(BuildTree::new(None), signal_tx);
        let handle = invoker.handle();

        let producer = tokio::spawn(async move {
            handle.on_event(build_start()).unwrap();
            for i in 0..20u64 {
                handle
                    .on_event(event(&format!("t{i}"), Some("b"), 10 + i, EventKind::Start))
                    .unwrap();
            }
        });
        producer.await.unwrap();

        let snapshot = invoker.snapshot().await.unwrap();
        let texts: Vec<String> = snapshot.rows.iter().skip(1).map(|r| r.text.clone()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        assert_eq!(texts, expected);

        let tree = invoker.shutdown().await.unwrap();
        assert_eq!(tree.mapped_len(), 21);
    }

    #[tokio::test]
    async fn test_signals_are_forwarded_and_coalesced() {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let invoker = TreeInvoker::spawn(BuildTree::new(Some(PathBuf::from("/w"))), signal_tx);

        invoker.on_event(build_start()).unwrap();
        invoker
            .on_event(event("t", Some("b"), 2, EventKind::Start))
            .unwrap();
        invoker
            .on_event(event(
                "e",
                Some("t"),
                3,
                EventKind::Message(MessageEvent {
                    severity: MessageKind::Error,
                    group: "rustc".to_string(),
                    file: Some(FilePosition {
                        path: PathBuf::from("/w/src/main.rs"),
                        line: 4,
                        column: 1,
                    }),
                    location: None,
                    details: None,
                }),
            ))
            .unwrap();
        invoker
            .on_event(event(
                "b",
                None,
                4,
                EventKind::FinishBuild {
                    result: EventResult::Failure { failures: vec![] },
                },
            ))
            .unwrap();

        // Closing the invoker closes the signal channel once drained.
        invoker.shutdown().await.unwrap();

        let batch = next_render_batch(&mut signal_rx).await.unwrap();
        assert!(batch.invalidate_all);
        assert!(batch.nodes.is_empty());
        assert_eq!(batch.selected, Some(NodeId(1)));
        assert_eq!(batch.context_menu, Some(vec![]));
        assert_eq!(
            batch.navigate.map(|l| l.to_string()),
            Some("/w/src/main.rs:4:1".to_string())
        );
        assert!(batch.merged > 4);
        assert!(next_render_batch(&mut signal_rx).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_and_filter_through_handle() {
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let invoker = TreeInvoker::spawn(BuildTree::new(None), signal_tx);
        let handle = invoker.handle();

        handle.on_event(build_start()).unwrap();
        handle
            .on_event(event("t", Some("b"), 2, EventKind::Start))
            .unwrap();
        handle
            .set_filter(Some(NodeFilter::new("none", |_| false)))
            .unwrap();
        assert_eq!(handle.snapshot().await.unwrap().rows.len(), 1);

        handle.set_filter(None).unwrap();
        assert_eq!(handle.snapshot().await.unwrap().rows.len(), 2);

        handle.clear().unwrap();
        drop(handle);
        let tree = invoker.shutdown().await.unwrap();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.mapped_len(), 0);
    }

    #[test]
    fn test_batch_keeps_first_navigation() {
        let mut batch = RenderBatch::default();
        batch.absorb(TreeSignal::Invalidate { node: NodeId(2) });
        batch.absorb(TreeSignal::Invalidate { node: NodeId(2) });
        batch.absorb(TreeSignal::Invalidate { node: NodeId(3) });
        assert_eq!(batch.nodes.len(), 2);

        let first = Location {
            path: PathBuf::from("a.rs"),
            line: 1,
            column: 0,
        };
        let second = Location {
            path: PathBuf::from("b.rs"),
            line: 2,
            column: 0,
        };
        batch.absorb(TreeSignal::Navigate {
            location: first.clone(),
        });
        batch.absorb(TreeSignal::Navigate { location: second });
        assert_eq!(batch.navigate, Some(first));

        batch.absorb(TreeSignal::InvalidateAll);
        batch.absorb(TreeSignal::Invalidate { node: NodeId(4) });
        assert!(batch.invalidate_all);
        assert!(batch.nodes.is_empty());
        assert_eq!(batch.merged, 7);
    }
}
