//! # Cache
//!
//! Module dedicated to the cache store. The [`CacheStore`] is an
//! in-memory index made of four maps:
//!
//! - folder slot → content address
//! - content address → [`MessageRecord`]
//! - conversation id → content addresses
//! - conversation id → pending thread
//!
//! A conversation id is either *fully known* (at least one cached
//! message carries it) or *known only by reference* (a cached message
//! refers to it, and its thread is kept in the pending map until a
//! message carrying it shows up). The two states never overlap.
//!
//! The store is only mutated through [`CacheStore::record_new_message`]
//! and [`CacheStore::remove_slot`], which keep the maps consistent.
//! The [`snapshot`] module saves and restores the whole store.

mod error;
pub mod snapshot;
mod thread;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    header::{ConversationId, MessageHeader},
    identity::ContentAddress,
    slot::FolderSlot,
};

#[doc(inline)]
pub use self::error::{Error, Result};

/// The message record.
///
/// Holds everything the cache knows about one message content.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessageRecord {
    /// The folder slots currently holding this content.
    pub aliases: BTreeSet<FolderSlot>,

    /// The `Message-ID` of the message, if any.
    pub conversation_id: Option<ConversationId>,

    /// The conversation ids of the thread the message belongs to.
    pub thread: BTreeSet<ConversationId>,
}

/// The outcome of [`CacheStore::record_new_message`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordOutcome {
    /// The slot was already cached, nothing changed.
    AlreadyCached,
    /// The content was already cached under another slot: the slot
    /// has been registered as a new alias.
    Aliased,
    /// The content was new: a record has been created.
    Added,
}

/// The cache store.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheStore {
    addresses: BTreeMap<FolderSlot, ContentAddress>,
    records: BTreeMap<ContentAddress, MessageRecord>,
    conversations: BTreeMap<ConversationId, BTreeSet<ContentAddress>>,
    pending: BTreeMap<ConversationId, BTreeSet<ConversationId>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct message contents.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.records.is_empty() && self.pending.is_empty()
    }

    pub fn contains_slot(&self, slot: &FolderSlot) -> bool {
        self.addresses.contains_key(slot)
    }

    pub fn address_of(&self, slot: &FolderSlot) -> Option<&ContentAddress> {
        self.addresses.get(slot)
    }

    pub fn record(&self, address: &ContentAddress) -> Option<&MessageRecord> {
        self.records.get(address)
    }

    pub fn record_of(&self, slot: &FolderSlot) -> Option<&MessageRecord> {
        self.records.get(self.addresses.get(slot)?)
    }

    /// Returns the content addresses registered under the given
    /// conversation id.
    pub fn conversation(&self, id: &ConversationId) -> Option<&BTreeSet<ContentAddress>> {
        self.conversations.get(id)
    }

    /// Returns the pending thread of a conversation id known only by
    /// reference.
    pub fn pending(&self, id: &ConversationId) -> Option<&BTreeSet<ConversationId>> {
        self.pending.get(id)
    }

    /// Iterates over the cached slots of the given folder, in
    /// ascending id order.
    pub fn slots_in<'a>(&'a self, folder: &str) -> impl Iterator<Item = &'a FolderSlot> + 'a {
        let start = FolderSlot::new(folder, u32::MIN);
        let end = FolderSlot::new(folder, u32::MAX);
        self.addresses.range(start..=end).map(|(slot, _)| slot)
    }

    /// Returns the names of all folders having at least one cached
    /// slot.
    pub fn folders(&self) -> BTreeSet<&str> {
        self.addresses
            .keys()
            .map(|slot| slot.folder.as_str())
            .collect()
    }

    /// Records the message held by the given slot.
    ///
    /// If the slot is already cached, nothing happens and no hash is
    /// computed. If the content is already known, the slot becomes a
    /// new alias of it. Otherwise a new record is created and its
    /// thread is merged with what the cache already knows.
    pub fn record_new_message(
        &mut self,
        slot: FolderSlot,
        header: &MessageHeader,
        size: u64,
    ) -> RecordOutcome {
        if self.contains_slot(&slot) {
            trace!(%slot, "slot already cached, skipping it");
            return RecordOutcome::AlreadyCached;
        }

        let address = ContentAddress::compute(header.raw(), size);
        let references = header.referenced_ids();
        self.record_message(slot, address, header.message_id().cloned(), &references)
    }

    /// Same as [`CacheStore::record_new_message`], with an already
    /// computed content address and parsed identity fields.
    pub fn record_message(
        &mut self,
        slot: FolderSlot,
        address: ContentAddress,
        conversation_id: Option<ConversationId>,
        references: &[ConversationId],
    ) -> RecordOutcome {
        if self.contains_slot(&slot) {
            trace!(%slot, "slot already cached, skipping it");
            return RecordOutcome::AlreadyCached;
        }

        if let Some(record) = self.records.get_mut(&address) {
            debug!(%slot, %address, "registering slot as alias of known content");
            record.aliases.insert(slot.clone());
            self.addresses.insert(slot, address);
            return RecordOutcome::Aliased;
        }

        debug!(%slot, %address, "adding new content");

        let thread = self.merge_thread(conversation_id.as_ref(), references);

        match conversation_id.as_ref() {
            Some(id) => {
                let addresses = self.conversations.entry(id.clone()).or_default();
                addresses.insert(address.clone());
                if addresses.len() > 1 {
                    warn!(
                        conversation_id = %id,
                        count = addresses.len(),
                        "distinct messages share the same message id",
                    );
                }
            }
            None => {
                warn!(%slot, "message has no message id, caching it by content only");
            }
        }

        self.records.insert(
            address.clone(),
            MessageRecord {
                aliases: BTreeSet::from_iter([slot.clone()]),
                conversation_id,
                thread: thread.clone(),
            },
        );
        self.addresses.insert(slot, address);
        self.spread_thread(&thread);

        RecordOutcome::Added
    }

    /// Removes the given slot from the cache.
    ///
    /// When the slot was the last alias of its content, the record is
    /// deleted. If no other content carries its conversation id
    /// anymore, the conversation becomes known only by reference and
    /// its thread (when it has more than one member) is kept as
    /// pending, so that a later arrival of the same conversation id
    /// recovers it.
    ///
    /// Returns `false` if the slot was not cached.
    pub fn remove_slot(&mut self, slot: &FolderSlot) -> bool {
        let Some(address) = self.addresses.remove(slot) else {
            return false;
        };

        let Some(record) = self.records.get_mut(&address) else {
            warn!(%slot, %address, "slot points to a missing record");
            return true;
        };

        record.aliases.remove(slot);

        if !record.aliases.is_empty() {
            debug!(%slot, %address, "removed alias, content still cached elsewhere");
            return true;
        }

        debug!(%slot, %address, "removed last alias, dropping content");

        let Some(record) = self.records.remove(&address) else {
            return true;
        };

        let Some(id) = record.conversation_id else {
            return true;
        };

        let Some(addresses) = self.conversations.get_mut(&id) else {
            return true;
        };

        addresses.remove(&address);

        if addresses.is_empty() {
            self.conversations.remove(&id);
            if record.thread.len() > 1 {
                trace!(conversation_id = %id, "keeping thread as pending");
                self.pending.insert(id, record.thread);
            }
        }

        true
    }

    /// Returns the names of the folders holding the content of the
    /// given slot.
    pub fn labels_of(&self, slot: &FolderSlot) -> Option<BTreeSet<String>> {
        let record = self.record_of(slot)?;
        let labels = record
            .aliases
            .iter()
            .map(|alias| alias.folder.clone())
            .collect();
        Some(labels)
    }

    /// Returns the thread the given conversation id belongs to, be
    /// it fully known or known only by reference.
    pub fn thread_of(&self, id: &ConversationId) -> Option<&BTreeSet<ConversationId>> {
        match self.conversations.get(id) {
            Some(addresses) => addresses
                .iter()
                .find_map(|address| self.records.get(address))
                .map(|record| &record.thread),
            None => self.pending.get(id),
        }
    }

    /// Returns the cached slots of the thread of the given slot,
    /// restricted to the given folder (the folder of the slot by
    /// default), sorted.
    ///
    /// Only cached messages are considered, so the result is as
    /// complete as the last synchronization pass.
    pub fn thread_slots(&self, slot: &FolderSlot, folder: Option<&str>) -> Vec<FolderSlot> {
        let folder = folder.unwrap_or(&slot.folder);

        let Some(record) = self.record_of(slot) else {
            return Vec::new();
        };

        let mut slots = BTreeSet::new();
        slots.extend(record.aliases.iter().filter(|s| s.folder == folder).cloned());

        for id in &record.thread {
            for address in self.conversations.get(id).into_iter().flatten() {
                if let Some(record) = self.records.get(address) {
                    slots.extend(record.aliases.iter().filter(|s| s.folder == folder).cloned());
                }
            }
        }

        slots.into_iter().collect()
    }

    /// Discards all cached data.
    pub fn clear(&mut self) {
        self.addresses.clear();
        self.records.clear();
        self.conversations.clear();
        self.pending.clear();
    }

    /// Checks the consistency of the four maps, returning a
    /// description of every broken invariant.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (slot, address) in &self.addresses {
            match self.records.get(address) {
                Some(record) if record.aliases.contains(slot) => (),
                Some(_) => violations.push(format!("{slot} is not an alias of {address}")),
                None => violations.push(format!("{slot} points to missing record {address}")),
            }
        }

        for (address, record) in &self.records {
            if record.aliases.is_empty() {
                violations.push(format!("record {address} has no alias"));
            }

            for alias in &record.aliases {
                if self.addresses.get(alias) != Some(address) {
                    violations.push(format!("alias {alias} of {address} is not indexed"));
                }
            }

            if let Some(id) = &record.conversation_id {
                let indexed = self
                    .conversations
                    .get(id)
                    .map(|addresses| addresses.contains(address))
                    .unwrap_or_default();
                if !indexed {
                    violations.push(format!("record {address} is not indexed under {id}"));
                }
            }
        }

        for (id, addresses) in &self.conversations {
            if addresses.is_empty() {
                violations.push(format!("conversation {id} has no content"));
            }

            for address in addresses {
                let carries_id = self
                    .records
                    .get(address)
                    .map(|record| record.conversation_id.as_ref() == Some(id))
                    .unwrap_or_default();
                if !carries_id {
                    violations.push(format!("conversation {id} lists foreign content {address}"));
                }
            }

            if self.pending.contains_key(id) {
                violations.push(format!("conversation {id} is both known and pending"));
            }
        }

        violations
    }
}
