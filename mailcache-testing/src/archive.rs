use mailcache::{archive::Archive, AnyResult};

use crate::Error;

/// The in-memory archive.
#[derive(Clone, Debug, Default)]
pub struct MemoryArchive {
    server_name: Option<String>,
    messages: Vec<Vec<u8>>,
    locked: bool,
    closed: usize,
    append_failures: usize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends the archive is hosted by the given server.
    pub fn on_server(name: impl ToString) -> Self {
        Self {
            server_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns the number of times the archive has been closed.
    pub fn closed(&self) -> usize {
        self.closed
    }

    /// Makes the next `times` appends fail.
    pub fn fail_append(&mut self, times: usize) {
        self.append_failures = times;
    }
}

impl Archive for MemoryArchive {
    fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    fn lock(&mut self) -> AnyResult<()> {
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) -> AnyResult<()> {
        self.locked = false;
        Ok(())
    }

    fn append(&mut self, message: &[u8]) -> AnyResult<()> {
        if !self.locked {
            return Err(Error::ArchiveNotLockedError.into());
        }

        if self.append_failures > 0 {
            self.append_failures -= 1;
            return Err(Error::InjectedAppendError.into());
        }

        self.messages.push(message.to_vec());
        Ok(())
    }

    fn close(&mut self) -> AnyResult<()> {
        self.closed += 1;
        Ok(())
    }
}
