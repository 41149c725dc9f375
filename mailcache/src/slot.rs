//! # Folder slot
//!
//! Module dedicated to folder slots. A [`FolderSlot`] identifies one
//! message instance on the server: a folder name and the server id of
//! the message in this folder. Since servers may reuse an id once the
//! original message is gone, a slot only makes sense relative to a
//! given synchronization pass.

use std::{fmt, result, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to folder slots.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse folder slot {0}: expected <folder>.<id>")]
    ParseFolderSlotError(String),
}

/// The folder slot.
///
/// Slots are ordered by folder first, then by id, which allows the
/// cache to iterate over the slots of one folder in ascending id
/// order. A slot is rendered (and serialized) as `<folder>.<id>`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderSlot {
    pub folder: String,
    pub id: u32,
}

impl FolderSlot {
    pub fn new(folder: impl ToString, id: u32) -> Self {
        Self {
            folder: folder.to_string(),
            id,
        }
    }
}

impl fmt::Display for FolderSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.folder, self.id)
    }
}

impl FromStr for FolderSlot {
    type Err = Error;

    fn from_str(slot: &str) -> result::Result<Self, Self::Err> {
        // folder names may contain dots, the id never does
        let (folder, id) = slot
            .rsplit_once('.')
            .ok_or_else(|| Error::ParseFolderSlotError(slot.to_owned()))?;
        let id = id
            .parse()
            .map_err(|_| Error::ParseFolderSlotError(slot.to_owned()))?;
        Ok(Self::new(folder, id))
    }
}

impl TryFrom<String> for FolderSlot {
    type Error = Error;

    fn try_from(slot: String) -> result::Result<Self, Self::Error> {
        slot.parse()
    }
}

impl From<FolderSlot> for String {
    fn from(slot: FolderSlot) -> Self {
        slot.to_string()
    }
}
