//! Ordered, truncatable per-track history.

use chrono::Utc;

use crate::artifact::SessionEntry;
use crate::error::{MuseError, Result};

/// History of prompts and their artifacts for one track.
///
/// The store is append-only except for truncation: deleting at `i` drops
/// `[i..]` in one step, so a surviving history is always a prefix of the
/// history it came from.
#[derive(Debug, Clone)]
pub struct ArtifactStore<A> {
    entries: Vec<SessionEntry<A>>,
}

impl<A> Default for ArtifactStore<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A> ArtifactStore<A> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new entry built from `prompt` and `artifact` and returns its index.
    pub fn append(&mut self, prompt: impl Into<String>, artifact: A) -> usize {
        let index = self.entries.len();
        self.entries.push(SessionEntry {
            index,
            prompt: prompt.into(),
            artifact,
            created_at: Utc::now(),
        });
        index
    }

    /// Removes every entry at or after `index`.
    ///
    /// `index == len()` is a no-op. Negative indices or indices past the end
    /// fail with [`MuseError::OutOfRange`] and leave the store untouched.
    pub fn truncate_from(&mut self, index: i64) -> Result<()> {
        let len = self.entries.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|position| *position <= len)
            .ok_or(MuseError::OutOfRange { index, len })?;
        self.entries.truncate(position);
        Ok(())
    }

    /// Artifact of the last surviving entry.
    pub fn latest(&self) -> Option<&A> {
        self.entries.last().map(|entry| &entry.artifact)
    }

    /// Last surviving entry.
    pub fn latest_entry(&self) -> Option<&SessionEntry<A>> {
        self.entries.last()
    }

    /// All surviving prompts, oldest first.
    pub fn prompt_chain(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.prompt.as_str()).collect()
    }

    pub fn entries(&self) -> &[SessionEntry<A>] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&SessionEntry<A>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
