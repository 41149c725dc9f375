use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use mailcache::session::MailSession;

use crate::{Error, MemorySession, Result};

/// The operations of a session, used to inject failures and to count
/// calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Op {
    CloneSession,
    ListFolders,
    SelectFolder,
    AllIds,
    FetchHeader,
    FetchSize,
    FetchMessage,
    Search,
    MoveMessage,
    MarkDeleted,
    Flush,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct StoredMessage {
    pub raw: Vec<u8>,
    pub deleted: bool,
}

impl StoredMessage {
    /// Returns the header part of the message, blank line excluded.
    pub fn header(&self) -> &[u8] {
        let raw = self.raw.as_slice();

        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            return &raw[..pos + 2];
        }

        if let Some(pos) = raw.windows(2).position(|w| w == b"\n\n") {
            return &raw[..pos + 1];
        }

        raw
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Folder {
    pub next_id: u32,
    pub messages: BTreeMap<u32, StoredMessage>,
}

impl Folder {
    pub fn append(&mut self, raw: Vec<u8>) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.messages.insert(id, StoredMessage { raw, deleted: false });
        id
    }
}

#[derive(Clone, Debug)]
struct Fault {
    op: Op,
    id: Option<u32>,
    remaining: usize,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub folders: BTreeMap<String, Folder>,
    faults: Vec<Fault>,
    counts: BTreeMap<Op, usize>,
    /// Header line prepended to every moved message.
    pub move_header: Option<String>,
}

impl State {
    /// Counts a call to the given operation, then fails if a failure
    /// has been injected for it.
    pub fn hit(&mut self, op: Op, id: Option<u32>) -> Result<()> {
        *self.counts.entry(op).or_default() += 1;

        let fault = self.faults.iter_mut().find(|fault| {
            fault.op == op && fault.remaining > 0 && (fault.id.is_none() || fault.id == id)
        });

        match fault {
            Some(fault) => {
                fault.remaining -= 1;
                match id {
                    Some(id) => Err(Error::InjectedMessageError(op, id)),
                    None => Err(Error::InjectedError(op)),
                }
            }
            None => Ok(()),
        }
    }

    pub fn folder(&self, folder: &str) -> Result<&Folder> {
        self.folders
            .get(folder)
            .ok_or_else(|| Error::FolderNotFoundError(folder.to_owned()))
    }

    pub fn folder_mut(&mut self, folder: &str) -> Result<&mut Folder> {
        self.folders
            .get_mut(folder)
            .ok_or_else(|| Error::FolderNotFoundError(folder.to_owned()))
    }

    pub fn message(&self, folder: &str, id: u32) -> Result<&StoredMessage> {
        self.folder(folder)?
            .messages
            .get(&id)
            .ok_or_else(|| Error::MessageNotFoundError(folder.to_owned(), id))
    }
}

/// The in-memory mail server.
///
/// Cloning the server gives another handle on the same state, like
/// opening another connection to a real server.
#[derive(Clone, Debug)]
pub struct MemoryServer {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryServer {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            state: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Opens a new session on the server.
    pub fn session(&self) -> MemorySession {
        MemorySession::new(self.clone())
    }

    pub fn boxed_session(&self) -> Box<dyn MailSession> {
        Box::new(self.session())
    }

    pub fn create_folder(&self, folder: impl ToString) {
        self.state().folders.entry(folder.to_string()).or_default();
    }

    pub fn delete_folder(&self, folder: &str) {
        self.state().folders.remove(folder);
    }

    /// Appends the given raw message to the given folder, creating
    /// the folder if needed. Returns the id of the new message.
    pub fn append(&self, folder: impl ToString, raw: impl AsRef<[u8]>) -> u32 {
        let mut state = self.state();
        let folder = state.folders.entry(folder.to_string()).or_default();
        folder.append(raw.as_ref().to_vec())
    }

    /// Same as [`MemoryServer::append`], with an explicit id.
    pub fn append_with_id(&self, folder: impl ToString, id: u32, raw: impl AsRef<[u8]>) {
        let mut state = self.state();
        let folder = state.folders.entry(folder.to_string()).or_default();
        let message = StoredMessage {
            raw: raw.as_ref().to_vec(),
            deleted: false,
        };
        folder.messages.insert(id, message);
        folder.next_id = folder.next_id.max(id);
    }

    /// Makes every subsequent move prepend the given header line to
    /// the moved message, like servers tracking the original folder
    /// do.
    pub fn rewrite_moves(&self, header: impl ToString) {
        self.state().move_header = Some(header.to_string());
    }

    pub fn remove(&self, folder: &str, id: u32) {
        if let Some(folder) = self.state().folders.get_mut(folder) {
            folder.messages.remove(&id);
        }
    }

    pub fn folders(&self) -> Vec<String> {
        self.state().folders.keys().cloned().collect()
    }

    /// Returns the ids of the given folder, flagged ones included.
    pub fn ids(&self, folder: &str) -> Vec<u32> {
        match self.state().folders.get(folder) {
            Some(folder) => folder.messages.keys().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn message(&self, folder: &str, id: u32) -> Option<Vec<u8>> {
        let state = self.state();
        let message = state.message(folder, id).ok()?;
        Some(message.raw.clone())
    }

    /// Returns the ids of the given folder flagged for deletion and
    /// not flushed yet.
    pub fn deleted_ids(&self, folder: &str) -> Vec<u32> {
        match self.state().folders.get(folder) {
            Some(folder) => folder
                .messages
                .iter()
                .filter(|(_, message)| message.deleted)
                .map(|(id, _)| *id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Makes the next `times` calls to the given operation fail.
    pub fn fail(&self, op: Op, times: usize) {
        self.inject(op, None, times)
    }

    /// Makes the next `times` calls to the given operation on the
    /// given message id fail.
    pub fn fail_on(&self, op: Op, id: u32, times: usize) {
        self.inject(op, Some(id), times)
    }

    fn inject(&self, op: Op, id: Option<u32>, times: usize) {
        self.state().faults.push(Fault {
            op,
            id,
            remaining: times,
        })
    }

    /// Returns the number of calls made to the given operation, failed
    /// ones included.
    pub fn count(&self, op: Op) -> usize {
        self.state().counts.get(&op).copied().unwrap_or_default()
    }

    pub fn reset_counts(&self) {
        self.state().counts.clear();
    }
}
