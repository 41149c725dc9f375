//! # Cache configuration
//!
//! Module dedicated to the cache configuration. All fields are
//! optional: getters fall back to defaults matching a Gmail account.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shellexpand_utils::shellexpand_path;

pub const ALL_MAIL: &str = "[Gmail]/All Mail";
pub const TRASH: &str = "[Gmail]/Trash";
pub const SPAM: &str = "[Gmail]/Spam";

pub const DEFAULT_CHECKPOINT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// The cache configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// The name of the account.
    ///
    /// It is used to build the default snapshot path.
    pub name: String,

    /// Customize the path of the cache snapshot. Defaults to
    /// `$XDG_DATA_HOME/mailcache/<account-name>.json`.
    pub snapshot_path: Option<PathBuf>,

    /// Save the cache during synchronization passes.
    ///
    /// Defaults to `true` when a snapshot path is explicitly set,
    /// `false` otherwise.
    pub autosave: Option<bool>,

    /// The canonical folder containing all messages of the account.
    pub all_mail_folder: Option<String>,

    /// The trash folder used when deleting messages.
    pub trash_folder: Option<String>,

    /// The folders skipped by synchronization passes, unless
    /// explicitly overridden.
    pub excluded_folders: Option<Vec<String>>,

    /// The number of new messages after which the cache is saved
    /// while synchronizing a folder.
    pub checkpoint_batch_size: Option<usize>,

    /// The number of times a failed synchronization pass is retried
    /// with a fresh session before giving up.
    pub max_attempts: Option<usize>,
}

impl CacheConfig {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn find_default_snapshot_path(&self) -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("mailcache").join(format!("{}.json", self.name)))
    }

    /// Returns the snapshot path, if any can be found.
    pub fn find_snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path
            .as_ref()
            .map(shellexpand_path)
            .or_else(|| self.find_default_snapshot_path())
    }

    /// Returns the path checkpoints are written to, or `None` when
    /// autosave is disabled.
    pub fn find_autosave_path(&self) -> Option<PathBuf> {
        let autosave = self.autosave.unwrap_or(self.snapshot_path.is_some());
        if autosave {
            self.find_snapshot_path()
        } else {
            None
        }
    }

    pub fn all_mail_folder(&self) -> &str {
        self.all_mail_folder.as_deref().unwrap_or(ALL_MAIL)
    }

    pub fn trash_folder(&self) -> &str {
        self.trash_folder.as_deref().unwrap_or(TRASH)
    }

    pub fn excluded_folders(&self) -> Vec<String> {
        match self.excluded_folders.as_ref() {
            Some(folders) => folders.clone(),
            None => vec![TRASH.to_owned(), SPAM.to_owned()],
        }
    }

    pub fn checkpoint_batch_size(&self) -> usize {
        self.checkpoint_batch_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_CHECKPOINT_BATCH_SIZE)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::CacheConfig;

    #[test]
    fn defaults() {
        let config = CacheConfig::new("gmail");

        assert_eq!(config.all_mail_folder(), "[Gmail]/All Mail");
        assert_eq!(config.trash_folder(), "[Gmail]/Trash");
        assert_eq!(
            config.excluded_folders(),
            vec!["[Gmail]/Trash".to_owned(), "[Gmail]/Spam".to_owned()]
        );
        assert_eq!(config.checkpoint_batch_size(), 1000);
        assert_eq!(config.max_attempts(), 10);
        assert_eq!(config.find_autosave_path(), None);
    }

    #[test]
    fn autosave_follows_explicit_snapshot_path() {
        let mut config = CacheConfig::new("gmail").with_snapshot_path("/tmp/mailcache.json");
        assert!(config.find_autosave_path().is_some());

        config.autosave = Some(false);
        assert_eq!(config.find_autosave_path(), None);
    }

    #[test]
    fn deserialize_kebab_case() {
        let config: CacheConfig = serde_json::from_str(
            r#"{ "name": "work", "trash-folder": "Trash", "max-attempts": 2 }"#,
        )
        .unwrap();

        assert_eq!(config.trash_folder(), "Trash");
        assert_eq!(config.max_attempts(), 2);
    }
}
