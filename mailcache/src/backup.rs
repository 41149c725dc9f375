//! # Backup
//!
//! Module dedicated to account backups. The main structure of this
//! module is [`BackupManager`].
//!
//! A backup goes through the canonical all-messages folder of the
//! account and appends every message to an [`Archive`], stamped with
//! the folders (labels) it currently belongs to and its id in the
//! all-messages folder. A backup stops at the first failing message
//! and returns the ids left to process, so it can be resumed later.

use std::{collections::BTreeSet, io, result};

use mail_builder::headers::{text::Text, Header};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    archive::{is_same_account, Archive},
    slot::FolderSlot,
    sync::{self, SyncEngine},
    AnyBoxedError,
};

/// The header carrying one label of the backed up message.
pub const LABEL_HEADER: &str = "X-Mailcache-Label";

/// The header carrying the id of the backed up message in the
/// all-messages folder.
pub const UID_HEADER: &str = "X-Mailcache-Uid";

/// Errors related to backups.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot backup account {0} into itself")]
    SameAccountError(String),
    #[error("cannot open a new session")]
    CloneSessionError(#[source] AnyBoxedError),
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] AnyBoxedError, String),
    #[error("cannot list message ids of folder {1}")]
    ListIdsError(#[source] AnyBoxedError, String),
    #[error("cannot lock archive")]
    LockArchiveError(#[source] AnyBoxedError),
    #[error("cannot fetch message {1}")]
    FetchMessageError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot find labels of message {0}: message not cached")]
    MissingCacheEntryError(FolderSlot),
    #[error("cannot stamp message {1}")]
    StampMessageError(#[source] io::Error, FolderSlot),
    #[error("cannot append message {1} to archive")]
    AppendMessageError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot refresh cache before backup")]
    SyncError(#[from] sync::Error),
}

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The backup manager.
///
/// It borrows the synchronization engine for the labels held by its
/// cache, and for refreshing the cache before backing up.
pub struct BackupManager<'a> {
    engine: &'a mut SyncEngine,
}

impl<'a> BackupManager<'a> {
    pub fn new(engine: &'a mut SyncEngine) -> Self {
        Self { engine }
    }

    /// Backs up the all-messages folder into the given archive.
    ///
    /// When `filter` is given, only the matching ids are backed up.
    /// When `refresh` is `true`, the cache is synchronized first so
    /// that labels are up to date.
    ///
    /// Returns the ids that have not been backed up because of a
    /// failure, starting with the failing one. An empty list means
    /// that everything has been backed up: passing a non-empty list
    /// back as `filter` resumes the backup.
    pub async fn backup(
        &mut self,
        archive: &mut dyn Archive,
        filter: Option<&[u32]>,
        refresh: bool,
    ) -> Result<Vec<u32>> {
        if is_same_account(archive, self.engine.session()) {
            let name = self.engine.session().server_name().to_owned();
            return Err(Error::SameAccountError(name));
        }

        if refresh {
            self.engine.update(None).await?;
        }

        let folder = self.engine.config().all_mail_folder().to_owned();

        let mut session = self
            .engine
            .session()
            .clone_session()
            .await
            .map_err(Error::CloneSessionError)?;

        session
            .select_folder(&folder)
            .await
            .map_err(|err| Error::SelectFolderError(err, folder.clone()))?;

        let ids: Vec<u32> = session
            .all_ids()
            .await
            .map_err(|err| Error::ListIdsError(err, folder.clone()))?
            .into_iter()
            .filter(|id| filter.map(|ids| ids.contains(id)).unwrap_or(true))
            .collect();

        info!(%folder, count = ids.len(), "backing up messages");

        archive.lock().map_err(Error::LockArchiveError)?;

        for (pos, id) in ids.iter().enumerate() {
            let slot = FolderSlot::new(&folder, *id);
            debug!(%slot, "backing up message");

            let res = async {
                let message = session
                    .fetch_message(*id)
                    .await
                    .map_err(|err| Error::FetchMessageError(err, slot.clone()))?;
                let labels = self
                    .engine
                    .cache()
                    .labels_of(&slot)
                    .ok_or_else(|| Error::MissingCacheEntryError(slot.clone()))?;
                let message = stamp(&message, &labels, *id)
                    .map_err(|err| Error::StampMessageError(err, slot.clone()))?;
                archive
                    .append(&message)
                    .map_err(|err| Error::AppendMessageError(err, slot.clone()))
            }
            .await;

            if let Err(err) = res {
                warn!("{err}, stopping backup");
                debug!("{err:?}");
                release(archive);
                return Ok(ids[pos..].to_vec());
            }
        }

        release(archive);
        info!(%folder, "backup done");
        Ok(Vec::new())
    }
}

fn release(archive: &mut dyn Archive) {
    if let Err(err) = archive.flush() {
        warn!("cannot flush archive: {err}");
    }
    if let Err(err) = archive.unlock() {
        warn!("cannot unlock archive: {err}");
    }
    if let Err(err) = archive.close() {
        warn!("cannot close archive: {err}");
    }
}

/// Prepends the label and id headers to the given raw message.
///
/// There is one label header per label, in sorted order. Non-ASCII
/// labels are encoded as RFC 2047 encoded words.
pub fn stamp(message: &[u8], labels: &BTreeSet<String>, id: u32) -> io::Result<Vec<u8>> {
    let mut stamped = Vec::with_capacity(message.len() + 64 * (labels.len() + 1));

    for label in labels {
        stamped.extend_from_slice(LABEL_HEADER.as_bytes());
        stamped.extend_from_slice(b": ");
        Text::new(label.as_str()).write_header(&mut stamped, LABEL_HEADER.len() + 2)?;
    }

    stamped.extend_from_slice(format!("{UID_HEADER}: {id}\r\n").as_bytes());
    stamped.extend_from_slice(message);

    Ok(stamped)
}
