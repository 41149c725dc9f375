use std::{io, path::PathBuf, result};

use thiserror::Error;

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot create cache snapshot directory {1}")]
    CreateSnapshotDirError(#[source] io::Error, PathBuf),
    #[error("cannot write cache snapshot at {1}")]
    WriteSnapshotError(#[source] io::Error, PathBuf),
    #[error("cannot serialize cache snapshot at {1}")]
    SerializeSnapshotError(#[source] serde_json::Error, PathBuf),
    #[error("cannot replace cache snapshot at {1}")]
    ReplaceSnapshotError(#[source] io::Error, PathBuf),
    #[error("cannot read cache snapshot at {1}")]
    ReadSnapshotError(#[source] io::Error, PathBuf),
    #[error("cannot parse cache snapshot at {1}")]
    ParseSnapshotError(#[source] serde_json::Error, PathBuf),
    #[error("cannot load inconsistent cache snapshot at {0}: {1}")]
    InconsistentSnapshotError(PathBuf, String),
    #[error("cannot find cache snapshot path")]
    GetSnapshotPathError,
}
