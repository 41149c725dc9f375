//! # Mail session
//!
//! Module dedicated to the mail session collaborator. The library
//! does not speak any mail protocol: everything it needs from the
//! server goes through the [`MailSession`] trait, which is usually
//! implemented on top of an IMAP client.
//!
//! Ids manipulated by a session are server ids relative to the
//! currently selected folder.

use std::fmt;

use async_trait::async_trait;

use crate::{header::ConversationId, AnyResult};

/// The search query.
///
/// Sessions need to support header equality on identity fields and
/// the boolean OR of two queries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchQuery {
    /// Matches messages whose `Message-ID` header equals the given
    /// id.
    MessageId(ConversationId),
    /// Matches messages whose `References` header contains the given
    /// id.
    References(ConversationId),
    /// Matches messages whose `In-Reply-To` header contains the given
    /// id.
    InReplyTo(ConversationId),
    Or(Box<SearchQuery>, Box<SearchQuery>),
}

impl SearchQuery {
    /// Builds the query matching messages that refer to the given
    /// conversation id.
    pub fn referencing(id: &ConversationId) -> Self {
        Self::Or(
            Box::new(Self::References(id.clone())),
            Box::new(Self::InReplyTo(id.clone())),
        )
    }
}

/// Renders the query using the IMAP search syntax.
impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MessageId(id) => write!(f, "HEADER Message-ID {id}"),
            Self::References(id) => write!(f, "HEADER References {id}"),
            Self::InReplyTo(id) => write!(f, "HEADER In-Reply-To {id}"),
            Self::Or(a, b) => write!(f, "OR ({a}) ({b})"),
        }
    }
}

#[async_trait]
pub trait MailSession: Send + Sync {
    /// Returns the name of the server the session is connected to.
    ///
    /// It is used to prevent archiving an account into itself.
    fn server_name(&self) -> &str;

    /// Opens a new session bound to the same account.
    ///
    /// The new session must not share any connection state with the
    /// current one, since the current one may be broken.
    async fn clone_session(&self) -> AnyResult<Box<dyn MailSession>>;

    /// Lists the names of all folders of the account.
    async fn list_folders(&mut self) -> AnyResult<Vec<String>>;

    async fn select_folder(&mut self, folder: &str) -> AnyResult<()>;

    /// Lists the ids of all messages of the selected folder, in
    /// ascending order and without duplicates.
    async fn all_ids(&mut self) -> AnyResult<Vec<u32>>;

    /// Fetches the raw header of the message matching the given id.
    async fn fetch_header(&mut self, id: u32) -> AnyResult<Vec<u8>>;

    /// Fetches the size in bytes of the message matching the given
    /// id.
    async fn fetch_size(&mut self, id: u32) -> AnyResult<u64>;

    /// Fetches the full raw message matching the given id.
    async fn fetch_message(&mut self, id: u32) -> AnyResult<Vec<u8>>;

    /// Searches the selected folder, returning the ids of matching
    /// messages.
    async fn search(&mut self, query: &SearchQuery) -> AnyResult<Vec<u32>>;

    /// Moves the message matching the given id to the given folder.
    async fn move_message(&mut self, id: u32, folder: &str) -> AnyResult<()>;

    /// Flags the message matching the given id for deletion.
    async fn mark_deleted(&mut self, id: u32) -> AnyResult<()>;

    /// Commits pending moves and deletions.
    async fn flush(&mut self) -> AnyResult<()>;
}
