//! In-memory collaborators for testing `mailcache-lib` without any
//! network access.
//!
//! A [`MemoryServer`] holds folders of raw messages and can be told
//! to fail on demand. Sessions opened on it with
//! [`MemoryServer::session`] implement
//! [`MailSession`](mailcache::session::MailSession), and a
//! [`MemoryArchive`] implements [`Archive`](mailcache::archive::Archive).

mod archive;
mod error;
mod message;
mod server;
mod session;

#[doc(inline)]
pub use self::{
    archive::MemoryArchive,
    error::{Error, Result},
    message::raw_message,
    server::{MemoryServer, Op},
    session::MemorySession,
};
