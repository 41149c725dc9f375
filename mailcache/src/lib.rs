//! Rust library to keep an incremental cache of a remote mail
//! account.
//!
//! The main purpose of this library is to track every message across
//! all folders of an account without downloading or hashing twice
//! what has already been seen. Messages are identified by a content
//! address (a hash of their header plus their size), so the same
//! message living in several folders (as Gmail labels do) is cached
//! once, with one alias per folder slot.
//!
//! On top of this cache, the library rebuilds conversation threads
//! from reference headers, exports the whole account to a local
//! archive (resumable after a partial failure) and deletes messages
//! safely through the trash folder.
//!
//! The mail protocol itself is not implemented here: it is consumed
//! through the [`MailSession`](crate::session::MailSession) trait,
//! and local archives through the [`Archive`](crate::archive::Archive)
//! trait.
//!
//! ## Components
//!
//! - [`CacheStore`](crate::cache::CacheStore): the in-memory index
//!   and its snapshot.
//! - [`SyncEngine`](crate::sync::SyncEngine): reconciles the cache
//!   with the server, folder by folder.
//! - [`BackupManager`](crate::backup::BackupManager): exports the
//!   canonical all-messages folder with labels.
//! - [`DeleteCoordinator`](crate::delete::DeleteCoordinator): moves
//!   a message to the trash and removes it from there.
//! - [`find_thread`](crate::thread::find_thread): rebuilds a thread
//!   from live searches, without cache.

pub mod archive;
pub mod backup;
pub mod cache;
pub mod config;
pub mod delete;
mod error;
pub mod header;
pub mod identity;
pub mod session;
pub mod slot;
pub mod sync;
pub mod thread;

#[doc(inline)]
pub use self::error::{AnyBoxedError, AnyError, AnyResult, Error, Result};
