use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use crate::constants::EDITS_SLOT;
use crate::corpus::Corpus;
use crate::slot::SlotStore;

/// Edit-related errors
#[derive(Debug)]
pub enum EditError {
    /// Word was empty after trimming
    EmptyWord,
    /// Export requested while no record has been edited
    NothingToExport,
    /// Reading or writing the persisted slot failed
    Storage(std::io::Error),
    /// Serializing the edit mapping failed
    Serialization(serde_json::Error),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::EmptyWord => write!(f, "Word must not be empty"),
            EditError::NothingToExport => write!(f, "{}", crate::constants::NO_EDITS_MESSAGE),
            EditError::Storage(err) => write!(f, "Storage error: {}", err),
            EditError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl StdError for EditError {}

impl From<std::io::Error> for EditError {
    fn from(err: std::io::Error) -> Self {
        EditError::Storage(err)
    }
}

impl From<serde_json::Error> for EditError {
    fn from(err: serde_json::Error) -> Self {
        EditError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, EditError>;

/// Which annotation set a word belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Booster,
    Hedge,
}

impl AnnotationKind {
    pub fn other(self) -> Self {
        match self {
            AnnotationKind::Booster => AnnotationKind::Hedge,
            AnnotationKind::Hedge => AnnotationKind::Booster,
        }
    }
}

/// User override of one record's annotations
///
/// The `original_*` sets are a snapshot of the record taken when the entry
/// was created. A word is never in both `edited_*` sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEntry {
    pub original_boosters: Vec<String>,
    pub original_hedges: Vec<String>,
    pub edited_boosters: Vec<String>,
    pub edited_hedges: Vec<String>,
    pub timestamp: String,
}

impl EditEntry {
    /// Seed an entry from a record's baseline sets
    pub fn seeded(original_boosters: &[String], original_hedges: &[String]) -> Self {
        Self {
            original_boosters: original_boosters.to_vec(),
            original_hedges: original_hedges.to_vec(),
            edited_boosters: original_boosters.to_vec(),
            edited_hedges: original_hedges.to_vec(),
            timestamp: now_iso(),
        }
    }

    pub fn edited(&self, kind: AnnotationKind) -> &[String] {
        match kind {
            AnnotationKind::Booster => &self.edited_boosters,
            AnnotationKind::Hedge => &self.edited_hedges,
        }
    }

    fn edited_mut(&mut self, kind: AnnotationKind) -> &mut Vec<String> {
        match kind {
            AnnotationKind::Booster => &mut self.edited_boosters,
            AnnotationKind::Hedge => &mut self.edited_hedges,
        }
    }

    /// Mark `word` as `kind`, dropping it from the other kind
    pub fn mark(&mut self, word: &str, kind: AnnotationKind) {
        let target = self.edited_mut(kind);
        if !target.iter().any(|w| w == word) {
            target.push(word.to_string());
        }
        self.edited_mut(kind.other()).retain(|w| w != word);
        self.touch();
    }

    /// Remove `word` from one kind, or from both when `kind` is `None`
    ///
    /// The timestamp is refreshed either way; returns whether a set shrank.
    pub fn unmark(&mut self, word: &str, kind: Option<AnnotationKind>) -> bool {
        let before = self.edited_boosters.len() + self.edited_hedges.len();
        match kind {
            Some(kind) => self.edited_mut(kind).retain(|w| w != word),
            None => {
                self.edited_boosters.retain(|w| w != word);
                self.edited_hedges.retain(|w| w != word);
            }
        }
        self.touch();
        self.edited_boosters.len() + self.edited_hedges.len() < before
    }

    /// Kind currently assigned to `word`, if any
    pub fn kind_of(&self, word: &str) -> Option<AnnotationKind> {
        if self.edited_boosters.iter().any(|w| w == word) {
            Some(AnnotationKind::Booster)
        } else if self.edited_hedges.iter().any(|w| w == word) {
            Some(AnnotationKind::Hedge)
        } else {
            None
        }
    }

    fn touch(&mut self) {
        self.timestamp = now_iso();
    }
}

/// Record id to edit entry, ordered by id
pub type EditMap = BTreeMap<String, EditEntry>;

/// Current instant as an ISO-8601 string with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read the persisted mapping; missing or unreadable state yields an empty map
pub fn load_edits(slots: &dyn SlotStore) -> EditMap {
    let stored = match slots.read(EDITS_SLOT) {
        Ok(Some(stored)) => stored,
        Ok(None) => return EditMap::new(),
        Err(e) => {
            error!("Failed to read edits slot '{}': {}", EDITS_SLOT, e);
            return EditMap::new();
        }
    };

    match serde_json::from_str::<EditMap>(&stored) {
        Ok(edits) => edits,
        Err(e) => {
            warn!("Failed to load edits, starting empty: {}", e);
            EditMap::new()
        }
    }
}

/// Overwrite the persisted mapping in full
pub fn save_edits(slots: &dyn SlotStore, edits: &EditMap) -> Result<()> {
    let serialized = serde_json::to_string(edits)?;
    slots.write(EDITS_SLOT, &serialized)?;
    Ok(())
}

/// Owns the edit mapping and flushes it to a slot store after every mutation
pub struct EditStore<S: SlotStore> {
    slots: S,
    edits: EditMap,
}

impl<S: SlotStore> EditStore<S> {
    /// Open the store, loading whatever the slot currently holds
    pub fn open(slots: S) -> Self {
        let edits = load_edits(&slots);
        if !edits.is_empty() {
            info!("Restored edits for {} records", edits.len());
        }
        Self { slots, edits }
    }

    /// Re-read the persisted mapping without touching in-memory state
    pub fn load(&self) -> EditMap {
        load_edits(&self.slots)
    }

    /// Overwrite the persisted mapping with `edits`
    pub fn save(&self, edits: &EditMap) -> Result<()> {
        save_edits(&self.slots, edits)
    }

    fn persist(&self) -> Result<()> {
        self.save(&self.edits).map_err(|e| {
            error!("Failed to persist edits: {}", e);
            e
        })
    }

    /// Mark `word` as `kind` on record `id`
    ///
    /// Returns `Ok(false)` when `id` is not in the corpus.
    pub fn add_annotation(
        &mut self,
        corpus: &Corpus,
        id: &str,
        word: &str,
        kind: AnnotationKind,
    ) -> Result<bool> {
        let word = word.trim();
        if word.is_empty() {
            return Err(EditError::EmptyWord);
        }

        let record = match corpus.record(id) {
            Some(record) => record,
            None => return Ok(false),
        };

        self.edits
            .entry(id.to_string())
            .or_insert_with(|| {
                EditEntry::seeded(&record.original_boosters, &record.original_hedges)
            })
            .mark(word, kind);

        self.persist()?;
        Ok(true)
    }

    /// Unmark `word` on record `id`, from `kind` or from whichever set holds it
    ///
    /// Returns `Ok(false)` when the record has no entry or the word was not
    /// in the targeted set. An existing entry is still touched and persisted.
    pub fn remove_annotation(
        &mut self,
        id: &str,
        word: &str,
        kind: Option<AnnotationKind>,
    ) -> Result<bool> {
        let word = word.trim();
        if word.is_empty() {
            return Err(EditError::EmptyWord);
        }

        let entry = match self.edits.get_mut(id) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let removed = entry.unmark(word, kind);

        self.persist()?;
        Ok(removed)
    }

    /// Number of records with an entry
    pub fn edited_count(&self) -> usize {
        self.edits.len()
    }

    pub fn is_edited(&self, id: &str) -> bool {
        self.edits.contains_key(id)
    }

    pub fn entry(&self, id: &str) -> Option<&EditEntry> {
        self.edits.get(id)
    }

    pub fn edits(&self) -> &EditMap {
        &self.edits
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Full mapping as pretty-printed JSON
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.edits)?)
    }
}
