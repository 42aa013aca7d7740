use std::io;
use std::path::PathBuf;

/// Errors that can occur outside the reducer itself.
///
/// The reducer never fails: malformed events are logged and dropped.
/// These cover loading configuration, parsing recorded event streams and
/// talking to the invoker task.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: yaml_serde::Error,
    },

    #[error("Invalid filter pattern '{pattern}': {source}")]
    FilterPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid event on line {line}: {source}")]
    EventParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tree invoker has shut down")]
    InvokerClosed,

    #[error("Tree invoker task failed: {0}")]
    InvokerJoin(#[from] tokio::task::JoinError),
}

/// Result type alias for buildtree operations
pub type Result<T> = std::result::Result<T, Error>;
