use async_trait::async_trait;
use mailcache::{
    header::MessageHeader,
    session::{MailSession, SearchQuery},
    AnyResult,
};
use tracing::trace;

use crate::{server::StoredMessage, Error, MemoryServer, Op, Result};

/// The in-memory mail session.
///
/// Moves are applied right away, deletions are applied on flush.
#[derive(Clone, Debug)]
pub struct MemorySession {
    server: MemoryServer,
    selected: Option<String>,
}

impl MemorySession {
    pub fn new(server: MemoryServer) -> Self {
        Self {
            server,
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn selected_folder(&self) -> Result<&str> {
        self.selected.as_deref().ok_or(Error::NoFolderSelectedError)
    }

    fn fetch<T>(&self, op: Op, id: u32, f: impl FnOnce(&StoredMessage) -> T) -> Result<T> {
        let folder = self.selected_folder()?;
        let mut state = self.server.state();
        state.hit(op, Some(id))?;
        let message = state.message(folder, id)?;
        Ok(f(message))
    }
}

fn matches(query: &SearchQuery, header: &MessageHeader) -> bool {
    match query {
        SearchQuery::MessageId(id) => header.message_id() == Some(id),
        SearchQuery::References(id) => header.references().contains(id),
        SearchQuery::InReplyTo(id) => header.in_reply_to().contains(id),
        SearchQuery::Or(a, b) => matches(a, header) || matches(b, header),
    }
}

#[async_trait]
impl MailSession for MemorySession {
    fn server_name(&self) -> &str {
        self.server.name()
    }

    async fn clone_session(&self) -> AnyResult<Box<dyn MailSession>> {
        self.server.state().hit(Op::CloneSession, None)?;
        Ok(self.server.boxed_session())
    }

    async fn list_folders(&mut self) -> AnyResult<Vec<String>> {
        let mut state = self.server.state();
        state.hit(Op::ListFolders, None)?;
        Ok(state.folders.keys().cloned().collect())
    }

    async fn select_folder(&mut self, folder: &str) -> AnyResult<()> {
        {
            let mut state = self.server.state();
            state.hit(Op::SelectFolder, None)?;
            state.folder(folder)?;
        }

        trace!(folder, "folder selected");
        self.selected = Some(folder.to_owned());
        Ok(())
    }

    async fn all_ids(&mut self) -> AnyResult<Vec<u32>> {
        let folder = self.selected_folder()?;
        let mut state = self.server.state();
        state.hit(Op::AllIds, None)?;
        let ids = state.folder(folder)?.messages.keys().copied().collect();
        Ok(ids)
    }

    async fn fetch_header(&mut self, id: u32) -> AnyResult<Vec<u8>> {
        Ok(self.fetch(Op::FetchHeader, id, |message| message.header().to_vec())?)
    }

    async fn fetch_size(&mut self, id: u32) -> AnyResult<u64> {
        Ok(self.fetch(Op::FetchSize, id, |message| message.raw.len() as u64)?)
    }

    async fn fetch_message(&mut self, id: u32) -> AnyResult<Vec<u8>> {
        Ok(self.fetch(Op::FetchMessage, id, |message| message.raw.clone())?)
    }

    async fn search(&mut self, query: &SearchQuery) -> AnyResult<Vec<u32>> {
        let folder = self.selected_folder()?;
        let mut state = self.server.state();
        state.hit(Op::Search, None)?;

        let ids = state
            .folder(folder)?
            .messages
            .iter()
            .filter(|(_, message)| matches(query, &MessageHeader::parse(message.header())))
            .map(|(id, _)| *id)
            .collect();

        Ok(ids)
    }

    async fn move_message(&mut self, id: u32, target: &str) -> AnyResult<()> {
        let folder = self.selected_folder()?.to_owned();
        let mut state = self.server.state();
        state.hit(Op::MoveMessage, Some(id))?;
        state.folder(target)?;

        let message = state
            .folder_mut(&folder)?
            .messages
            .remove(&id)
            .ok_or_else(|| Error::MessageNotFoundError(folder.clone(), id))?;
        let raw = match &state.move_header {
            Some(header) => [format!("{header}\r\n").into_bytes(), message.raw].concat(),
            None => message.raw,
        };
        state.folder_mut(target)?.append(raw);

        Ok(())
    }

    async fn mark_deleted(&mut self, id: u32) -> AnyResult<()> {
        let folder = self.selected_folder()?.to_owned();
        let mut state = self.server.state();
        state.hit(Op::MarkDeleted, Some(id))?;

        let message = state
            .folder_mut(&folder)?
            .messages
            .get_mut(&id)
            .ok_or_else(|| Error::MessageNotFoundError(folder.clone(), id))?;
        message.deleted = true;

        Ok(())
    }

    async fn flush(&mut self) -> AnyResult<()> {
        let mut state = self.server.state();
        state.hit(Op::Flush, None)?;

        if let Some(folder) = self.selected.as_deref() {
            state
                .folder_mut(folder)?
                .messages
                .retain(|_, message| !message.deleted);
        }

        Ok(())
    }
}
