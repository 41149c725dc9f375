//! # Delete
//!
//! Module dedicated to safe message deletion. The main structure of
//! this module is [`DeleteCoordinator`].
//!
//! On a Gmail-like account, removing a message from a folder only
//! removes a label. To really delete a message, it is moved to the
//! trash folder, then found again in the trash and flagged for
//! deletion there. The second step refuses to guess: if the trash
//! holds several copies of the message, nothing is flagged.

use std::result;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    archive::{is_same_account, Archive},
    config::CacheConfig,
    header::{ConversationId, MessageHeader},
    session::{MailSession, SearchQuery},
    slot::FolderSlot,
    AnyBoxedError, AnyResult,
};

/// Errors related to deletion.
///
/// These errors are raised before the message is touched: the
/// account is left unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot backup message of account {0} into itself")]
    SameAccountError(String),
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] AnyBoxedError, String),
    #[error("cannot fetch message {1}")]
    FetchMessageError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot fetch header of {1}")]
    FetchHeaderError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot fetch size of {1}")]
    FetchSizeError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot backup message {1}")]
    BackupMessageError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot delete message {0}: missing message id")]
    MissingConversationIdError(FolderSlot),
}

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The outcome of a deletion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteStatus {
    /// The message has been moved to the trash, then flagged for
    /// deletion there.
    Deleted,
    /// The message could not be moved to the trash. The account is
    /// unchanged, the deletion can be retried.
    NotMoved,
    /// The message has been moved to the trash but could not be
    /// deleted from there. It now only lives in the trash.
    NotDeletedFromTrash,
    /// The message has been moved to the trash, but several messages
    /// of the trash share its message id and size. Nothing has been
    /// flagged: the trash needs to be cleaned manually.
    AmbiguousTrash,
}

/// The delete coordinator.
#[derive(Clone, Debug)]
pub struct DeleteCoordinator {
    trash_folder: String,
}

impl DeleteCoordinator {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            trash_folder: config.trash_folder().to_owned(),
        }
    }

    /// Deletes the message of the given slot, optionally backing it
    /// up first into the given archive.
    ///
    /// Errors are only returned when nothing has been moved yet.
    /// Once the message left its folder, the outcome is reported by
    /// the [`DeleteStatus`].
    pub async fn delete(
        &self,
        session: &mut dyn MailSession,
        slot: &FolderSlot,
        backup: Option<&mut dyn Archive>,
    ) -> Result<DeleteStatus> {
        if let Some(archive) = backup.as_deref() {
            if is_same_account(archive, session) {
                return Err(Error::SameAccountError(session.server_name().to_owned()));
            }
        }

        session
            .select_folder(&slot.folder)
            .await
            .map_err(|err| Error::SelectFolderError(err, slot.folder.clone()))?;

        let header = match backup {
            Some(archive) => {
                let message = session
                    .fetch_message(slot.id)
                    .await
                    .map_err(|err| Error::FetchMessageError(err, slot.clone()))?;
                let header = MessageHeader::parse(message.as_slice());
                let id = header
                    .message_id()
                    .ok_or_else(|| Error::MissingConversationIdError(slot.clone()))?;

                debug!(%slot, conversation_id = %id, "backing up message before deletion");
                backup_message(archive, &message)
                    .map_err(|err| Error::BackupMessageError(err, slot.clone()))?;
                header
            }
            None => {
                let header = session
                    .fetch_header(slot.id)
                    .await
                    .map_err(|err| Error::FetchHeaderError(err, slot.clone()))?;
                MessageHeader::parse(header)
            }
        };

        let id = header
            .message_id()
            .cloned()
            .ok_or_else(|| Error::MissingConversationIdError(slot.clone()))?;

        let size = session
            .fetch_size(slot.id)
            .await
            .map_err(|err| Error::FetchSizeError(err, slot.clone()))?;

        if let Err(err) = self.move_to_trash(session, slot).await {
            warn!(%slot, "cannot move message to trash: {err}");
            debug!("{err:?}");
            return Ok(DeleteStatus::NotMoved);
        }

        let status = match self.delete_from_trash(session, &id, size).await {
            Ok(status) => status,
            Err(err) => {
                warn!(%slot, "cannot delete message from trash: {err}");
                debug!("{err:?}");
                DeleteStatus::NotDeletedFromTrash
            }
        };

        if status == DeleteStatus::Deleted {
            if let Err(err) = session.select_folder(&slot.folder).await {
                warn!(folder = %slot.folder, "cannot reselect folder: {err}");
            }
            info!(%slot, conversation_id = %id, "message deleted");
        }

        Ok(status)
    }

    async fn move_to_trash(&self, session: &mut dyn MailSession, slot: &FolderSlot) -> AnyResult<()> {
        debug!(%slot, trash = %self.trash_folder, "moving message to trash");
        session.move_message(slot.id, &self.trash_folder).await?;
        session.flush().await?;
        Ok(())
    }

    async fn delete_from_trash(
        &self,
        session: &mut dyn MailSession,
        id: &ConversationId,
        size: u64,
    ) -> AnyResult<DeleteStatus> {
        session.select_folder(&self.trash_folder).await?;

        let mut candidates = Vec::new();
        for candidate in session.search(&SearchQuery::MessageId(id.clone())).await? {
            if session.fetch_size(candidate).await? == size {
                candidates.push(candidate);
            }
        }

        match candidates.as_slice() {
            [] => {
                warn!(conversation_id = %id, "cannot find message in trash");
                Ok(DeleteStatus::NotDeletedFromTrash)
            }
            [candidate] => {
                session.mark_deleted(*candidate).await?;
                session.flush().await?;
                Ok(DeleteStatus::Deleted)
            }
            candidates => {
                warn!(
                    conversation_id = %id,
                    count = candidates.len(),
                    "ambiguous deletion, several copies found in trash",
                );
                Ok(DeleteStatus::AmbiguousTrash)
            }
        }
    }
}

fn backup_message(archive: &mut dyn Archive, message: &[u8]) -> AnyResult<()> {
    archive.lock()?;
    let res = archive.append(message).and_then(|()| archive.flush());
    archive.unlock()?;
    res
}
