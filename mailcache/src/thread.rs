//! # Live thread
//!
//! Module dedicated to thread discovery without cache. The main
//! function of this module is [`find_thread`].
//!
//! The thread is rebuilt by searching the folder breadth-first:
//! every conversation id reached is searched for the messages
//! carrying it and for the messages referring to it, until no new id
//! shows up. Only the given folder is searched, so copies of the same
//! messages living in other folders are not part of the result. Use
//! the all-messages folder of the account for a complete thread.

use std::{
    collections::{BTreeMap, BTreeSet},
    result,
};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    header::{ConversationId, MessageHeader},
    session::{MailSession, SearchQuery},
    slot::FolderSlot,
    AnyBoxedError,
};

/// Errors related to live thread discovery.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] AnyBoxedError, String),
    #[error("cannot fetch header of {1}")]
    FetchHeaderError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot search folder {1} for {2}")]
    SearchError(#[source] AnyBoxedError, String, SearchQuery),
}

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// Finds the slots of the given folder belonging to the same thread
/// as the message matching the given id, sorted by id.
///
/// The result contains the message itself.
pub async fn find_thread(
    session: &mut dyn MailSession,
    folder: &str,
    id: u32,
) -> Result<Vec<FolderSlot>> {
    session
        .select_folder(folder)
        .await
        .map_err(|err| Error::SelectFolderError(err, folder.to_owned()))?;

    let mut finder = ThreadFinder {
        session,
        folder,
        headers: BTreeMap::new(),
        open: BTreeSet::new(),
        closed: BTreeSet::new(),
        found: BTreeSet::from_iter([id]),
    };

    let target = finder.header(id).await?;
    finder.open.extend(target.referenced_ids());

    if let Some(target_id) = target.message_id() {
        finder.closed.insert(target_id.clone());
        finder.expand_referencing(target_id).await?;
    }

    while let Some(conversation_id) = finder.open.pop_first() {
        if !finder.closed.insert(conversation_id.clone()) {
            continue;
        }

        trace!(%conversation_id, "expanding conversation");
        finder.expand_carrying(&conversation_id).await?;
        finder.expand_referencing(&conversation_id).await?;
    }

    debug!(folder, id, count = finder.found.len(), "thread found");

    let slots = finder
        .found
        .into_iter()
        .map(|id| FolderSlot::new(folder, id))
        .collect();

    Ok(slots)
}

struct ThreadFinder<'a> {
    session: &'a mut dyn MailSession,
    folder: &'a str,
    headers: BTreeMap<u32, MessageHeader>,
    open: BTreeSet<ConversationId>,
    closed: BTreeSet<ConversationId>,
    found: BTreeSet<u32>,
}

impl ThreadFinder<'_> {
    async fn header(&mut self, id: u32) -> Result<MessageHeader> {
        if let Some(header) = self.headers.get(&id) {
            return Ok(header.clone());
        }

        let header = self
            .session
            .fetch_header(id)
            .await
            .map_err(|err| Error::FetchHeaderError(err, FolderSlot::new(self.folder, id)))?;
        let header = MessageHeader::parse(header);
        self.headers.insert(id, header.clone());

        Ok(header)
    }

    async fn search(&mut self, query: SearchQuery) -> Result<Vec<u32>> {
        match self.session.search(&query).await {
            Ok(ids) => Ok(ids),
            Err(err) => Err(Error::SearchError(err, self.folder.to_owned(), query)),
        }
    }

    /// Adds the messages carrying the given conversation id to the
    /// thread, and opens the ids they refer to.
    async fn expand_carrying(&mut self, conversation_id: &ConversationId) -> Result<()> {
        let query = SearchQuery::MessageId(conversation_id.clone());

        for id in self.search(query).await? {
            self.found.insert(id);
            let header = self.header(id).await?;
            self.open_all(header.referenced_ids());
        }

        Ok(())
    }

    /// Adds the messages referring to the given conversation id to
    /// the thread, and opens their own ids.
    async fn expand_referencing(&mut self, conversation_id: &ConversationId) -> Result<()> {
        let query = SearchQuery::referencing(conversation_id);

        for id in self.search(query).await? {
            self.found.insert(id);
            let header = self.header(id).await?;
            self.open_all(header.message_id().cloned());
        }

        Ok(())
    }

    fn open_all(&mut self, ids: impl IntoIterator<Item = ConversationId>) {
        for id in ids {
            if !self.closed.contains(&id) {
                self.open.insert(id);
            }
        }
    }
}
