//! # Header
//!
//! Module dedicated to message headers. The cache only needs three
//! header fields: `Message-ID`, which gives the [`ConversationId`] of
//! a message, and `References` plus `In-Reply-To`, which give the
//! conversation ids a message refers to.

use std::{borrow::Borrow, fmt, ops::Deref};

use mail_parser::{HeaderValue, MessageParser};
use serde::{Deserialize, Serialize};

/// The conversation id of a message, as found in its `Message-ID`
/// header (without angle brackets).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl ToString) -> Self {
        let id = id.to_string();
        let id = id.trim().trim_start_matches('<').trim_end_matches('>');
        Self(id.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ConversationId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for ConversationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// The raw header of a message, with its identity fields parsed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageHeader {
    raw: Vec<u8>,
    message_id: Option<ConversationId>,
    references: Vec<ConversationId>,
    in_reply_to: Vec<ConversationId>,
}

impl MessageHeader {
    /// Parses the given raw header.
    ///
    /// A full message can be given as well: only its header part is
    /// taken into account. Parsing never fails: missing or invalid
    /// fields are just left empty.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        let mut header = Self::default();

        if let Some(msg) = MessageParser::default().parse(raw.as_slice()) {
            header.message_id = msg.message_id().map(ConversationId::new);
            header.references = parse_ids(msg.references());
            header.in_reply_to = parse_ids(msg.in_reply_to());
        }

        header.raw = raw;
        header
    }

    /// Returns the raw bytes the header was parsed from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn message_id(&self) -> Option<&ConversationId> {
        self.message_id.as_ref()
    }

    pub fn references(&self) -> &[ConversationId] {
        &self.references
    }

    pub fn in_reply_to(&self) -> &[ConversationId] {
        &self.in_reply_to
    }

    /// Returns the raw reference list of the message: ids from the
    /// `References` header followed by ids from the `In-Reply-To`
    /// header, without duplicates.
    pub fn referenced_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = Vec::new();

        for id in self.references.iter().chain(&self.in_reply_to) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        ids
    }

    /// Returns `true` if the message refers to the given conversation
    /// id, either from `References` or from `In-Reply-To`.
    pub fn refers_to(&self, id: &ConversationId) -> bool {
        self.references.contains(id) || self.in_reply_to.contains(id)
    }
}

fn parse_ids(value: &HeaderValue) -> Vec<ConversationId> {
    match value {
        HeaderValue::Text(id) => vec![ConversationId::new(id)],
        HeaderValue::TextList(ids) => ids.iter().map(ConversationId::new).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use concat_with::concat_line;

    use super::{ConversationId, MessageHeader};

    #[test]
    fn parse_identity_fields() {
        let header = MessageHeader::parse(concat_line!(
            "Message-ID: <c@localhost>",
            "References: <a@localhost> <b@localhost>",
            "In-Reply-To: <b@localhost>",
            "Subject: Re: hello",
            "",
        ));

        assert_eq!(header.message_id(), Some(&ConversationId::new("c@localhost")));
        assert_eq!(
            header.referenced_ids(),
            vec![
                ConversationId::new("a@localhost"),
                ConversationId::new("b@localhost"),
            ]
        );
        assert!(header.refers_to(&"a@localhost".into()));
        assert!(!header.refers_to(&"c@localhost".into()));
    }

    #[test]
    fn parse_header_without_identity() {
        let header = MessageHeader::parse(concat_line!("Subject: orphan", ""));

        assert_eq!(header.message_id(), None);
        assert!(header.referenced_ids().is_empty());
        assert_eq!(header.raw(), b"Subject: orphan\n");
    }

    #[test]
    fn conversation_id_strips_brackets() {
        assert_eq!(ConversationId::new(" <a@localhost> ").as_str(), "a@localhost");
        assert_eq!(ConversationId::new("a@localhost").to_string(), "<a@localhost>");
    }
}
