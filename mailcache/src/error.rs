use std::{any::Any, error, result};

use thiserror::Error;

use crate::{backup, cache, delete, sync, thread};

/// The global any `Result` alias of the library.
///
/// The difference with [`Result`] is that it takes a dynamic error
/// `Box<dyn AnyError>`. It is the return type of every collaborator
/// operation (mail sessions and archives).
pub type AnyResult<T> = result::Result<T, AnyBoxedError>;

/// The global, downcastable any `Error` trait of the library.
///
/// This trait is used instead of [`Error`] when an error that is not
/// known at compilation time cannot be placed in a generic due to
/// object-safe trait constraint. The main use case is for mail
/// session implementations.
pub trait AnyError: error::Error + Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// The global any boxed `Error` alias of the library.
pub type AnyBoxedError = Box<dyn AnyError + Send + 'static>;

impl error::Error for AnyBoxedError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.as_ref().source()
    }
}

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    CacheError(#[from] cache::Error),
    #[error(transparent)]
    SyncError(#[from] sync::Error),
    #[error(transparent)]
    BackupError(#[from] backup::Error),
    #[error(transparent)]
    DeleteError(#[from] delete::Error),
    #[error(transparent)]
    ThreadError(#[from] thread::Error),
}

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;
