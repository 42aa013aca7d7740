use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque identity of a build event, supplied by the producer.
///
/// Start and message events each carry a unique id; progress and finish
/// events reuse the id of the node they update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle events emitted by a build tool integration.
///
/// These events decouple the producer (a build tool, a recorded stream)
/// from the tree reducer, which folds them into an execution tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    pub id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EventId>,
    /// Event time in epoch milliseconds.
    pub time: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The lifecycle phase an event describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// The whole build has started. Reuses the tree's build-progress root.
    StartBuild {
        #[serde(default)]
        title: String,
        /// Labels of actions that can restart this build.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        restart_actions: Vec<String>,
    },
    /// A task within the build has started.
    Start,
    /// Progress update for a running task.
    Progress {
        #[serde(default)]
        total: i64,
        #[serde(default)]
        progress: i64,
        #[serde(default)]
        unit: String,
    },
    /// A diagnostic or informational message attached to a task.
    Message(MessageEvent),
    /// A task has finished.
    Finish { result: EventResult },
    /// The whole build has finished.
    FinishBuild { result: EventResult },
}

impl EventKind {
    /// Result carried by a finish-class event.
    pub fn result(&self) -> Option<&EventResult> {
        match self {
            EventKind::Finish { result } | EventKind::FinishBuild { result } => Some(result),
            _ => None,
        }
    }
}

/// Payload of a message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub severity: MessageKind,
    /// Group discriminator, e.g. "compiler" or "lint".
    #[serde(default)]
    pub group: String,
    /// Present when the message refers to a source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FilePosition>,
    /// Explicit navigation target; falls back to `file` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Free-text detail shown when the message node is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl MessageEvent {
    pub fn navigatable(&self) -> Option<Location> {
        self.location
            .clone()
            .or_else(|| self.file.as_ref().map(FilePosition::location))
    }
}

/// Severity of a message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    Warning,
    Info,
    Statistics,
    Simple,
}

/// A position inside a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePosition {
    pub path: PathBuf,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl FilePosition {
    pub fn location(&self) -> Location {
        Location {
            path: self.path.clone(),
            line: self.line,
            column: self.column,
        }
    }
}

/// A navigable location a renderer can jump to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.column > 0 {
                write!(f, ":{}", self.column)?;
            }
        }
        Ok(())
    }
}

/// Outcome carried by finish events and message events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EventResult {
    Success {
        #[serde(default)]
        up_to_date: bool,
    },
    Skipped,
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Failure {
        #[serde(default)]
        failures: Vec<Failure>,
    },
}

/// One failure reported by a failed task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Message of the underlying error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Failure {
    /// Text shown for this failure: description, else message, else the error.
    pub fn text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }
}

/// Parse a JSON Lines event stream.
///
/// Blank lines and lines starting with `#` are skipped. Line numbers in
/// errors are 1-based.
pub fn parse_event_stream(input: &str) -> crate::Result<Vec<BuildEvent>> {
    let mut events = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| crate::Error::EventParse {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}
