//! # Archive
//!
//! Module dedicated to the archive collaborator: an append-only
//! local message store (typically a mbox file) used as a backup
//! target.

use crate::{session::MailSession, AnyResult};

pub trait Archive: Send {
    /// Returns the name of the server hosting the archive, if the
    /// archive is remote.
    ///
    /// Local archives return `None`, which is the default.
    fn server_name(&self) -> Option<&str> {
        None
    }

    fn lock(&mut self) -> AnyResult<()>;

    fn unlock(&mut self) -> AnyResult<()>;

    /// Appends the given raw message to the archive.
    fn append(&mut self, message: &[u8]) -> AnyResult<()>;

    /// Makes appended messages durable.
    fn flush(&mut self) -> AnyResult<()> {
        Ok(())
    }

    fn close(&mut self) -> AnyResult<()>;
}

/// Returns `true` if the given archive lives on the same server as
/// the given session.
pub fn is_same_account(archive: &dyn Archive, session: &dyn MailSession) -> bool {
    archive.server_name() == Some(session.server_name())
}
