//! # Cache snapshot
//!
//! Module dedicated to the persistence of the cache store. The four
//! maps are saved together as one JSON document. Saving never
//! overwrites the snapshot in place: the document is written to a
//! temporary file next to it, then renamed over it, so that a crash
//! while saving leaves the previous snapshot intact.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use super::{CacheStore, Error, Result};

impl CacheStore {
    /// Saves the cache at the given path, atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        debug!(path = %path.display(), records = self.len(), "saving cache snapshot");

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|err| Error::CreateSnapshotDirError(err, dir.to_owned()))?;
        }

        let tmp_path = tmp_path(path);

        let file = File::create(&tmp_path)
            .map_err(|err| Error::WriteSnapshotError(err, tmp_path.clone()))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, self)
            .map_err(|err| Error::SerializeSnapshotError(err, tmp_path.clone()))?;

        let file = writer
            .into_inner()
            .map_err(|err| Error::WriteSnapshotError(err.into_error(), tmp_path.clone()))?;
        file.sync_all()
            .map_err(|err| Error::WriteSnapshotError(err, tmp_path.clone()))?;
        drop(file);

        fs::rename(&tmp_path, path)
            .map_err(|err| Error::ReplaceSnapshotError(err, path.to_owned()))?;

        Ok(())
    }

    /// Loads the cache from the given path.
    ///
    /// The snapshot must exist, be readable and be consistent.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading cache snapshot");

        let file = File::open(path).map_err(|err| Error::ReadSnapshotError(err, path.to_owned()))?;
        let cache: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| Error::ParseSnapshotError(err, path.to_owned()))?;

        let violations = cache.check_invariants();
        if !violations.is_empty() {
            let violations = violations.join(", ");
            return Err(Error::InconsistentSnapshotError(path.to_owned(), violations));
        }

        info!(path = %path.display(), records = cache.len(), "cache snapshot loaded");
        Ok(cache)
    }

    /// Loads the cache from the given path, falling back to an empty
    /// cache when the snapshot is missing or corrupted.
    pub fn load(path: impl AsRef<Path>) -> Self {
        match Self::try_load(path) {
            Ok(cache) => cache,
            Err(err) => {
                warn!("{err}, starting with an empty cache");
                debug!("{err:?}");
                Self::default()
            }
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp_path = OsString::from(path.as_os_str());
    tmp_path.push(".tmp");
    PathBuf::from(tmp_path)
}
