//! # Synchronization
//!
//! Module dedicated to the synchronization of the cache with the
//! server. The main structure of this module is [`SyncEngine`].
//!
//! A synchronization pass goes through every folder of the account
//! (except excluded ones). For each folder, slots that disappeared
//! from the server are removed from the cache, then slots that are
//! new to the cache are fetched (header and size only) and recorded.
//! The cache is saved after every folder and after every batch of
//! new messages.
//!
//! A pass that fails is not resumed: it is restarted from scratch
//! with a fresh session, up to a maximum number of attempts. Since
//! already cached slots are skipped before any fetch, a restarted
//! pass only redoes the work that was not done yet.

pub mod report;
pub mod retry;

use std::{
    collections::BTreeSet,
    path::Path,
    result,
    sync::Arc,
};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    cache::{self, CacheStore, RecordOutcome},
    config::CacheConfig,
    header::MessageHeader,
    session::MailSession,
    slot::FolderSlot,
    AnyBoxedError,
};

use self::{
    report::SyncReport,
    retry::{Retry, RetryState},
};

/// Errors related to synchronization.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open a new session")]
    CloneSessionError(#[source] AnyBoxedError),
    #[error("cannot list folders")]
    ListFoldersError(#[source] AnyBoxedError),
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] AnyBoxedError, String),
    #[error("cannot list message ids of folder {1}")]
    ListIdsError(#[source] AnyBoxedError, String),
    #[error("cannot fetch header of {1}")]
    FetchHeaderError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot fetch size of {1}")]
    FetchSizeError(#[source] AnyBoxedError, FolderSlot),
    #[error("cannot save cache checkpoint")]
    SaveCheckpointError(#[source] cache::Error),
}

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The synchronization engine.
///
/// The engine owns the cache: it is the only component allowed to
/// mutate it. It also owns the session used as template to open a
/// fresh session for every pass attempt.
pub struct SyncEngine {
    config: Arc<CacheConfig>,
    session: Box<dyn MailSession>,
    cache: CacheStore,
    retry: Retry,
}

impl SyncEngine {
    /// Creates a new engine with an empty cache.
    pub fn new(config: Arc<CacheConfig>, session: Box<dyn MailSession>) -> Self {
        let retry = Retry::new(config.max_attempts());

        Self {
            config,
            session,
            cache: CacheStore::new(),
            retry,
        }
    }

    /// Creates a new engine, restoring the cache from the configured
    /// snapshot when possible.
    pub fn load(config: Arc<CacheConfig>, session: Box<dyn MailSession>) -> Self {
        let cache = match config.find_snapshot_path() {
            Some(path) => CacheStore::load(path),
            None => {
                warn!("cannot find cache snapshot path, starting with an empty cache");
                CacheStore::new()
            }
        };

        Self::new(config, session).with_cache(cache)
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn session(&self) -> &dyn MailSession {
        self.session.as_ref()
    }

    /// Discards all cached data.
    ///
    /// The snapshot is left untouched until the next save.
    pub fn clear(&mut self) {
        info!("clearing cache");
        self.cache.clear();
    }

    /// Saves the cache at the configured snapshot path.
    pub fn save(&self) -> cache::Result<()> {
        let path = self
            .config
            .find_snapshot_path()
            .ok_or(cache::Error::GetSnapshotPathError)?;
        self.cache.save(path)
    }

    /// Runs a synchronization pass over all folders, except the given
    /// excluded ones (the configured ones if `None`).
    ///
    /// A failed pass is retried from scratch with a new session. Once
    /// the maximum number of attempts is reached, the last error is
    /// returned.
    pub async fn update(&mut self, excluded: Option<&[String]>) -> Result<SyncReport> {
        let excluded: BTreeSet<String> = match excluded {
            Some(folders) => folders.iter().cloned().collect(),
            None => self.config.excluded_folders().into_iter().collect(),
        };

        let autosave_path = self.config.find_autosave_path();

        loop {
            let res = self.try_update(&excluded, autosave_path.as_deref()).await;

            match self.retry.next(res) {
                RetryState::Ok(mut report) => {
                    report.attempts = self.retry.attempts + 1;
                    self.retry.reset();
                    info!(
                        added = report.added(),
                        aliased = report.aliased(),
                        removed = report.removed(),
                        attempts = report.attempts,
                        "synchronization pass done",
                    );
                    return Ok(report);
                }
                RetryState::Retry(err) => {
                    warn!(attempt = self.retry.attempts, "{err}, retrying with a new session");
                    debug!("{err:?}");
                    self.checkpoint_after_failure(autosave_path.as_deref());
                }
                RetryState::Exhausted(err) => {
                    warn!(attempts = self.retry.attempts + 1, "{err}, giving up");
                    self.retry.reset();
                    self.checkpoint_after_failure(autosave_path.as_deref());
                    return Err(err);
                }
            }
        }
    }

    async fn try_update(
        &mut self,
        excluded: &BTreeSet<String>,
        autosave_path: Option<&Path>,
    ) -> Result<SyncReport> {
        let mut session = self
            .session
            .clone_session()
            .await
            .map_err(Error::CloneSessionError)?;

        SyncPass {
            cache: &mut self.cache,
            session: session.as_mut(),
            excluded,
            autosave_path,
            batch_size: self.config.checkpoint_batch_size(),
            report: SyncReport::default(),
        }
        .run()
        .await
    }

    fn checkpoint_after_failure(&self, path: Option<&Path>) {
        if let Some(path) = path {
            if let Err(err) = self.cache.save(path) {
                warn!("{err}, checkpoint skipped");
                debug!("{err:?}");
            }
        }
    }
}

/// One synchronization pass, bound to one session.
struct SyncPass<'a> {
    cache: &'a mut CacheStore,
    session: &'a mut dyn MailSession,
    excluded: &'a BTreeSet<String>,
    autosave_path: Option<&'a Path>,
    batch_size: usize,
    report: SyncReport,
}

impl SyncPass<'_> {
    async fn run(mut self) -> Result<SyncReport> {
        let folders = self
            .session
            .list_folders()
            .await
            .map_err(Error::ListFoldersError)?;

        self.remove_vanished_folders(&folders)?;

        for folder in &folders {
            if self.excluded.contains(folder) {
                debug!(%folder, "folder excluded, skipping it");
                continue;
            }

            info!(%folder, "synchronizing folder");
            self.sync_folder(folder).await?;
            self.checkpoint()?;
        }

        Ok(self.report)
    }

    fn remove_vanished_folders(&mut self, folders: &[String]) -> Result<()> {
        let vanished: Vec<String> = self
            .cache
            .folders()
            .into_iter()
            .filter(|folder| !self.excluded.contains(*folder))
            .filter(|folder| !folders.iter().any(|f| f == folder))
            .map(ToOwned::to_owned)
            .collect();

        for folder in vanished {
            info!(%folder, "folder vanished from server, removing its slots");
            let slots: Vec<FolderSlot> = self.cache.slots_in(&folder).cloned().collect();
            for slot in &slots {
                self.cache.remove_slot(slot);
            }
            self.report.folder_mut(&folder).removed += slots.len();
            self.checkpoint()?;
        }

        Ok(())
    }

    async fn sync_folder(&mut self, folder: &str) -> Result<()> {
        self.session
            .select_folder(folder)
            .await
            .map_err(|err| Error::SelectFolderError(err, folder.to_owned()))?;

        let mut ids = self
            .session
            .all_ids()
            .await
            .map_err(|err| Error::ListIdsError(err, folder.to_owned()))?;

        if !ids.windows(2).all(|w| w[0] < w[1]) {
            debug!(%folder, "server ids are not sorted, sorting them");
            ids.sort_unstable();
            ids.dedup();
        }

        let cached_ids: Vec<u32> = self.cache.slots_in(folder).map(|slot| slot.id).collect();
        let stale_ids = stale_ids(&cached_ids, &ids);

        for id in &stale_ids {
            let slot = FolderSlot::new(folder, *id);
            trace!(%slot, "removing slot from cache");
            self.cache.remove_slot(&slot);
        }

        self.report.folder_mut(folder).removed += stale_ids.len();

        let mut batch = 0;

        for id in ids {
            let slot = FolderSlot::new(folder, id);

            if self.cache.contains_slot(&slot) {
                continue;
            }

            let header = self
                .session
                .fetch_header(id)
                .await
                .map_err(|err| Error::FetchHeaderError(err, slot.clone()))?;
            let size = self
                .session
                .fetch_size(id)
                .await
                .map_err(|err| Error::FetchSizeError(err, slot.clone()))?;

            let header = MessageHeader::parse(header);

            match self.cache.record_new_message(slot, &header, size) {
                RecordOutcome::Added => self.report.folder_mut(folder).added += 1,
                RecordOutcome::Aliased => self.report.folder_mut(folder).aliased += 1,
                RecordOutcome::AlreadyCached => (),
            }

            batch += 1;
            if batch == self.batch_size {
                batch = 0;
                self.checkpoint()?;
            }
        }

        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        if let Some(path) = self.autosave_path {
            debug!(path = %path.display(), "saving checkpoint");
            self.cache.save(path).map_err(Error::SaveCheckpointError)?;
        }
        Ok(())
    }
}

/// Returns the cached ids that are not on the server anymore.
///
/// Both lists must be sorted in ascending order, which allows a
/// single forward scan of the server ids.
fn stale_ids(cached_ids: &[u32], server_ids: &[u32]) -> Vec<u32> {
    let mut stale_ids = Vec::new();
    let mut server_ids = server_ids.iter().peekable();

    for id in cached_ids {
        while server_ids.next_if(|server_id| *server_id < id).is_some() {}

        if server_ids.peek() != Some(&id) {
            stale_ids.push(*id);
        }
    }

    stale_ids
}

#[cfg(test)]
mod tests {
    use super::stale_ids;

    #[test]
    fn stale_ids_forward_scan() {
        assert_eq!(stale_ids(&[3, 5, 7], &[3, 7, 9]), vec![5]);
        assert_eq!(stale_ids(&[1, 2, 3], &[]), vec![1, 2, 3]);
        assert_eq!(stale_ids(&[], &[1, 2]), Vec::<u32>::new());
        assert_eq!(stale_ids(&[2, 4, 10, 11], &[1, 4, 10]), vec![2, 11]);
        assert_eq!(stale_ids(&[5], &[1, 2, 3, 4, 5]), Vec::<u32>::new());
    }
}
