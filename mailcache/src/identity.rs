//! # Identity
//!
//! Module dedicated to message identity. A message is identified by
//! its [`ContentAddress`]: the SHA-224 hash of its raw header,
//! followed by a dot and its size in bytes. Two messages with the
//! same header bytes and the same size are considered the same
//! message, even when they live in different folders.

use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};

use crate::{session::MailSession, AnyResult};

/// The content address of a message.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Computes the content address of the given raw header and
    /// message size.
    pub fn compute(header: impl AsRef<[u8]>, size: u64) -> Self {
        let digest = Sha224::digest(header.as_ref());
        Self(format!("{digest:x}.{size}"))
    }

    /// Returns the hexadecimal digest part of the address.
    pub fn digest(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((digest, _)) => digest,
            None => &self.0,
        }
    }

    /// Returns the size part of the address, if it can be parsed.
    pub fn size(&self) -> Option<u64> {
        self.0.rsplit_once('.')?.1.parse().ok()
    }
}

impl Deref for ContentAddress {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fetches the header and the size of the message matching the given
/// id in the currently selected folder, then computes its content
/// address.
pub async fn fetch_content_address(
    session: &mut dyn MailSession,
    id: u32,
) -> AnyResult<ContentAddress> {
    let header = session.fetch_header(id).await?;
    let size = session.fetch_size(id).await?;
    Ok(ContentAddress::compute(header, size))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::{
        session::{MailSession, SearchQuery},
        AnyResult,
    };

    use super::{fetch_content_address, ContentAddress};

    const HEADER: &[u8] = b"Message-ID: <a@localhost>\r\nSubject: hello\r\n";

    /// Session serving a single message with id 7.
    struct SingleMessageSession {
        fetches: usize,
    }

    #[async_trait]
    impl MailSession for SingleMessageSession {
        fn server_name(&self) -> &str {
            "localhost"
        }

        async fn clone_session(&self) -> AnyResult<Box<dyn MailSession>> {
            unimplemented!()
        }

        async fn list_folders(&mut self) -> AnyResult<Vec<String>> {
            unimplemented!()
        }

        async fn select_folder(&mut self, _folder: &str) -> AnyResult<()> {
            unimplemented!()
        }

        async fn all_ids(&mut self) -> AnyResult<Vec<u32>> {
            unimplemented!()
        }

        async fn fetch_header(&mut self, id: u32) -> AnyResult<Vec<u8>> {
            assert_eq!(id, 7);
            self.fetches += 1;
            Ok(HEADER.to_vec())
        }

        async fn fetch_size(&mut self, id: u32) -> AnyResult<u64> {
            assert_eq!(id, 7);
            self.fetches += 1;
            Ok(1024)
        }

        async fn fetch_message(&mut self, _id: u32) -> AnyResult<Vec<u8>> {
            unimplemented!()
        }

        async fn search(&mut self, _query: &SearchQuery) -> AnyResult<Vec<u32>> {
            unimplemented!()
        }

        async fn move_message(&mut self, _id: u32, _folder: &str) -> AnyResult<()> {
            unimplemented!()
        }

        async fn mark_deleted(&mut self, _id: u32) -> AnyResult<()> {
            unimplemented!()
        }

        async fn flush(&mut self) -> AnyResult<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn fetch_content_address_uses_header_and_size() {
        let mut session = SingleMessageSession { fetches: 0 };

        let address = fetch_content_address(&mut session, 7).await.unwrap();

        assert_eq!(address, ContentAddress::compute(HEADER, 1024));
        assert_eq!(session.fetches, 2);
    }

    #[test]
    fn compute_is_deterministic() {
        let header = b"Message-ID: <a@localhost>\r\nSubject: hello\r\n";

        let a = ContentAddress::compute(header, 42);
        let b = ContentAddress::compute(header, 42);

        assert_eq!(a, b);
        assert_eq!(a.size(), Some(42));
        assert_eq!(a.digest().len(), 56);
        assert!(a.ends_with(".42"));
    }

    #[test]
    fn compute_distinguishes_header_and_size() {
        let header = b"Message-ID: <a@localhost>\r\n";
        let other_header = b"Message-ID: <b@localhost>\r\n";

        let a = ContentAddress::compute(header, 42);

        assert_ne!(a, ContentAddress::compute(header, 43));
        assert_ne!(a, ContentAddress::compute(other_header, 42));
        assert_eq!(a.digest(), ContentAddress::compute(header, 43).digest());
    }
}
