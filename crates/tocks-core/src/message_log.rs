//! Structurally shared message log.
//!
//! A [`MessageLog`] keeps messages sorted by id in fixed-size chunks behind
//! `Arc`s. Cloning the log clones two pointers. Appending to a log that a
//! snapshot still shares copies at most one chunk, so a session that
//! publishes a snapshot after every message stays linear overall.

use std::sync::Arc;

use crate::model::{Message, MessageId};

/// Messages per sealed chunk.
const CHUNK_LEN: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Sealed(usize),
    Tail,
}

/// Messages of one chat in id order.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    /// Full chunks, never empty. Every id here is lower than every id in
    /// `tail`.
    sealed: Arc<Vec<Arc<Vec<Message>>>>,
    tail: Arc<Vec<Message>>,
    len: usize,
}

impl MessageLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the log holds no message.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Messages in id order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.sealed.iter().flat_map(|chunk| chunk.iter()).chain(self.tail.iter())
    }

    /// Message with the lowest id.
    pub fn first(&self) -> Option<&Message> {
        self.iter().next()
    }

    /// Message with the highest id.
    pub fn last(&self) -> Option<&Message> {
        self.tail.last().or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    /// Look up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        let chunk = self.chunk(self.slot(id));
        chunk.binary_search_by_key(&id, |m| m.id).ok().map(|idx| &chunk[idx])
    }

    /// Insert `message` at its id position. Returns `false` if the id is
    /// already present.
    pub(crate) fn insert(&mut self, message: Message) -> bool {
        let slot = self.slot(message.id);
        let Err(idx) = self.chunk(slot).binary_search_by_key(&message.id, |m| m.id) else {
            return false;
        };

        match slot {
            Slot::Tail => {
                Arc::make_mut(&mut self.tail).insert(idx, message);
                if self.tail.len() >= CHUNK_LEN {
                    let full = std::mem::take(&mut self.tail);
                    Arc::make_mut(&mut self.sealed).push(full);
                }
            },
            Slot::Sealed(i) => {
                let sealed = Arc::make_mut(&mut self.sealed);
                let chunk = Arc::make_mut(&mut sealed[i]);
                chunk.insert(idx, message);
                if chunk.len() >= 2 * CHUNK_LEN {
                    let upper = chunk.split_off(CHUNK_LEN);
                    sealed.insert(i + 1, Arc::new(upper));
                }
            },
        }

        self.len += 1;
        true
    }

    /// Mutable access to message `id`, unsharing only its chunk.
    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let chunk = match self.slot(id) {
            Slot::Tail => &mut self.tail,
            Slot::Sealed(i) => &mut Arc::make_mut(&mut self.sealed)[i],
        };
        let idx = chunk.binary_search_by_key(&id, |m| m.id).ok()?;
        Some(&mut Arc::make_mut(chunk)[idx])
    }

    /// Chunk that holds, or would hold, `id`.
    fn slot(&self, id: MessageId) -> Slot {
        let i = self.sealed.partition_point(|chunk| chunk.last().is_some_and(|m| m.id < id));
        if i < self.sealed.len() { Slot::Sealed(i) } else { Slot::Tail }
    }

    fn chunk(&self, slot: Slot) -> &[Message] {
        match slot {
            Slot::Sealed(i) => &self.sealed[i],
            Slot::Tail => &self.tail,
        }
    }
}

impl PartialEq for MessageLog {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for MessageLog {}
