//! Per-field candidate ledger.
//!
//! Append-only: candidates are never edited or removed, and arrival order is
//! preserved. A candidate whose value matches an existing one (stringified,
//! case-insensitive) is dropped so repeated evidence never reads as a conflict.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::BatchId;
use crate::path::FieldPath;
use crate::value::Value;

pub const PAGE_NOT_AVAILABLE: &str = "N/A";

/// One proposed value for a field, with its source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub value: Value,
    #[serde(default, deserialize_with = "source_name")]
    pub source_file: String,
    #[serde(default = "default_page_number", deserialize_with = "page_number")]
    pub page_number: String,
    /// Batch that reported this candidate, stamped on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchId>,
}

impl Candidate {
    pub fn new(value: impl Into<Value>, source_file: impl Into<String>, page_number: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source_file: source_file.into(),
            page_number: page_number.into(),
            batch: None,
        }
    }

    pub fn in_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    /// De-duplication key: stringified, lower-cased value.
    pub fn dedup_key(&self) -> String {
        self.value.stringify().to_lowercase()
    }
}

pub(crate) fn default_page_number() -> String {
    PAGE_NOT_AVAILABLE.to_string()
}

/// Models report page numbers as strings or bare numbers; both land as text.
pub(crate) fn page_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.is_empty() => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => default_page_number(),
    })
}

/// Source names arrive as null when the model could not attribute a value;
/// those land as an empty name instead of rejecting the batch.
pub(crate) fn source_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateLedger {
    entries: BTreeMap<FieldPath, Vec<Candidate>>,
}

impl CandidateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a ledger with `incoming` folded into the entry at `path`.
    ///
    /// A new path takes `incoming` as-is. Otherwise each incoming candidate is
    /// appended only when no candidate already in the entry (including ones
    /// appended earlier in this call) shares its de-duplication key; the
    /// earliest representative of a value is the one kept.
    pub fn add_candidates(&self, path: &FieldPath, incoming: &[Candidate]) -> Self {
        let mut next = self.clone();
        match next.entries.get_mut(path) {
            None => {
                next.entries.insert(path.clone(), incoming.to_vec());
            }
            Some(existing) => {
                let mut known: Vec<String> = existing.iter().map(Candidate::dedup_key).collect();
                for candidate in incoming {
                    let key = candidate.dedup_key();
                    if !known.contains(&key) {
                        known.push(key);
                        existing.push(candidate.clone());
                    }
                }
            }
        }
        next
    }

    /// Candidates for `path` in arrival order; empty when unknown.
    pub fn get(&self, path: &FieldPath) -> &[Candidate] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn candidate(&self, path: &FieldPath, index: usize) -> Option<&Candidate> {
        self.get(path).get(index)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.keys()
    }

    /// Number of field paths with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
