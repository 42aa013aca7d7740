//! Folds a stream of build/task lifecycle events into a tree of execution
//! nodes: parent/child linkage, de-duplication by event identity and
//! error/warning propagation to ancestors.

pub mod config;
pub mod details;
pub mod error;
pub mod events;
pub mod filter;
pub mod invoker;
pub mod node;
pub mod snapshot;
pub mod tree;

pub use error::{Error, Result};
pub use events::{BuildEvent, EventId, EventKind, EventResult};
pub use node::{ExecutionNode, NodeId, ProblemKind};
pub use tree::{BuildTree, TreeSignal};
