//! # Thread merge
//!
//! Thread bookkeeping of the cache. Threads are sets of conversation
//! ids, merged transitively from explicit reference headers only.
//! This is best effort: arrival order matters for indirect
//! relationships, and relationships not expressed by headers (like
//! forwards) are not modeled.

use std::collections::BTreeSet;

use tracing::{trace, warn};

use crate::header::ConversationId;

use super::CacheStore;

impl CacheStore {
    /// Computes the thread of a new message from its own conversation
    /// id and the conversation ids it refers to.
    ///
    /// The thread is the union of:
    ///
    /// - the pending thread of its own id, which is consumed,
    /// - the threads of the referenced messages already cached,
    /// - the pending threads of the referenced ids known only by
    ///   reference,
    /// - the references themselves and its own id.
    pub(super) fn merge_thread(
        &mut self,
        conversation_id: Option<&ConversationId>,
        references: &[ConversationId],
    ) -> BTreeSet<ConversationId> {
        let mut thread = BTreeSet::new();

        if let Some(id) = conversation_id {
            if let Some(pending) = self.pending.remove(id) {
                trace!(conversation_id = %id, "consuming pending thread");
                thread.extend(pending);
            }
            thread.insert(id.clone());
        }

        let mut known: Option<&BTreeSet<ConversationId>> = None;

        for reference in references {
            match self.conversations.get(reference) {
                Some(addresses) => {
                    for record in addresses.iter().filter_map(|a| self.records.get(a)) {
                        let first = *known.get_or_insert(&record.thread);
                        if *first != record.thread {
                            warn!(
                                conversation_id = %reference,
                                "referenced messages belong to diverging threads, merging them",
                            );
                        }
                        thread.extend(record.thread.iter().cloned());
                    }
                }
                None => {
                    if let Some(pending) = self.pending.get(reference) {
                        thread.extend(pending.iter().cloned());
                    }
                }
            }
        }

        thread.extend(references.iter().cloned());
        thread
    }

    /// Writes the given thread onto every cached message carrying one
    /// of its conversation ids, and as pending thread of every member
    /// not cached yet.
    pub(super) fn spread_thread(&mut self, thread: &BTreeSet<ConversationId>) {
        for id in thread {
            match self.conversations.get(id) {
                Some(addresses) => {
                    for address in addresses {
                        if let Some(record) = self.records.get_mut(address) {
                            record.thread = thread.clone();
                        }
                    }
                }
                None => {
                    self.pending.insert(id.clone(), thread.clone());
                }
            }
        }
    }
}
