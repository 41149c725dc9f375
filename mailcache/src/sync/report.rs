//! # Sync report
//!
//! Module dedicated to synchronization reporting. The main structure
//! of this module is [`SyncReport`].

use std::collections::BTreeMap;

/// The folder synchronization report.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderSyncReport {
    /// The number of slots holding content new to the cache.
    pub added: usize,
    /// The number of new slots holding already cached content.
    pub aliased: usize,
    /// The number of slots removed from the cache.
    pub removed: usize,
}

/// The synchronization report of a successful pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncReport {
    /// Reports of the processed folders, by folder name.
    pub folders: BTreeMap<String, FolderSyncReport>,
    /// The number of attempts the pass needed, including the
    /// successful one.
    pub attempts: usize,
}

impl SyncReport {
    pub fn folder_mut(&mut self, folder: &str) -> &mut FolderSyncReport {
        self.folders.entry(folder.to_owned()).or_default()
    }

    pub fn added(&self) -> usize {
        self.folders.values().map(|r| r.added).sum()
    }

    pub fn aliased(&self) -> usize {
        self.folders.values().map(|r| r.aliased).sum()
    }

    pub fn removed(&self) -> usize {
        self.folders.values().map(|r| r.removed).sum()
    }
}
