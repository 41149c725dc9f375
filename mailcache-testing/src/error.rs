use std::{any::Any, result};

use mailcache::{AnyBoxedError, AnyError};
use thiserror::Error;

use crate::Op;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("injected failure on {0:?}")]
    InjectedError(Op),
    #[error("injected failure on {0:?} for message {1}")]
    InjectedMessageError(Op, u32),
    #[error("cannot find folder {0}")]
    FolderNotFoundError(String),
    #[error("cannot find message {1} in folder {0}")]
    MessageNotFoundError(String, u32),
    #[error("cannot use session: no folder selected")]
    NoFolderSelectedError,
    #[error("injected failure on archive append")]
    InjectedAppendError,
    #[error("cannot use archive: archive not locked")]
    ArchiveNotLockedError,
}

impl AnyError for Error {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Error> for AnyBoxedError {
    fn from(err: Error) -> Self {
        Box::new(err)
    }
}
