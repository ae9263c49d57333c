//! Per-field provenance and conflict state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::ledger::{default_page_number, page_number, source_name, Candidate, CandidateLedger, PAGE_NOT_AVAILABLE};
use crate::path::FieldPath;
use crate::value::Value;

/// Provenance recorded for fields edited by hand.
pub const MANUAL_SOURCE: &str = "manual";

/// Separator between selected candidates in a composed value.
pub const COMPOSE_SEPARATOR: &str = "\n\n";

/// Current provenance and adjudication state of one field.
///
/// `resolved == false` means new evidence is waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    #[serde(default, deserialize_with = "source_name")]
    pub filename: String,
    #[serde(default = "default_page_number", deserialize_with = "page_number")]
    pub page_number: String,
    /// Ledger indices composing the value, ascending.
    #[serde(default)]
    pub selected_indices: BTreeSet<usize>,
    #[serde(default = "default_resolved")]
    pub resolved: bool,
}

fn default_resolved() -> bool {
    true
}

impl SourceRecord {
    pub fn new(filename: impl Into<String>, page_number: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            page_number: page_number.into(),
            selected_indices: BTreeSet::new(),
            resolved: true,
        }
    }

    /// Provenance taken from a single candidate.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self::new(candidate.source_file.clone(), candidate.page_number.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTracker {
    entries: BTreeMap<FieldPath, SourceRecord>,
}

impl SourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &FieldPath) -> Option<&SourceRecord> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &SourceRecord)> {
        self.entries.iter()
    }

    /// Number of fields with provenance; this is the extracted field count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold one batch's provenance for `path` into the tracker.
    ///
    /// A new path takes `batch_source` as-is. For a known path only the
    /// resolved flag changes: it drops to `false` when the field already held
    /// a value or the batch itself reported the field as unresolved.
    pub fn record_batch(&self, path: &FieldPath, batch_source: &SourceRecord, was_previously_filled: bool) -> Self {
        let mut next = self.clone();
        match next.entries.get_mut(path) {
            None => {
                next.entries.insert(path.clone(), batch_source.clone());
            }
            Some(entry) => {
                if was_previously_filled || !batch_source.resolved {
                    entry.resolved = false;
                }
            }
        }
        next
    }

    /// Flip `index` in the selection for `path` and compose the new value.
    ///
    /// The composed value joins the selected candidates' strings with a blank
    /// line, in index order. Provenance follows the first selected candidate,
    /// or the toggled one when nothing stays selected. Any toggle reopens the
    /// field for explicit resolution.
    pub fn toggle_candidate(
        &self,
        ledger: &CandidateLedger,
        path: &FieldPath,
        index: usize,
    ) -> Result<(Self, Value), ReconError> {
        let candidates = ledger.get(path);
        let toggled = candidates.get(index).ok_or_else(|| ReconError::CandidateOutOfRange {
            path: path.clone(),
            index,
            available: candidates.len(),
        })?;

        let mut next = self.clone();
        let entry = next
            .entries
            .entry(path.clone())
            .or_insert_with(|| SourceRecord::from_candidate(toggled));

        if !entry.selected_indices.remove(&index) {
            entry.selected_indices.insert(index);
        }

        let composed = entry
            .selected_indices
            .iter()
            .filter_map(|i| candidates.get(*i))
            .map(|c| c.value.stringify())
            .collect::<Vec<_>>()
            .join(COMPOSE_SEPARATOR);

        let lead = entry
            .selected_indices
            .first()
            .and_then(|i| candidates.get(*i))
            .unwrap_or(toggled);
        entry.filename = lead.source_file.clone();
        entry.page_number = lead.page_number.clone();
        entry.resolved = false;

        Ok((next, Value::Text(composed)))
    }

    /// Mark the conflict at `path` as adjudicated. Unknown paths are left alone.
    pub fn resolve(&self, path: &FieldPath) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(path) {
            entry.resolved = true;
        }
        next
    }

    /// Put `path` back in front of the reviewer. Unknown paths are left alone.
    pub fn reopen(&self, path: &FieldPath) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(path) {
            entry.resolved = false;
        }
        next
    }

    /// Make `index` the sole selection for `path` and mark it resolved.
    pub fn select_only(&self, path: &FieldPath, index: usize, candidate: &Candidate) -> Self {
        let mut next = self.clone();
        next.entries.insert(
            path.clone(),
            SourceRecord {
                filename: candidate.source_file.clone(),
                page_number: candidate.page_number.clone(),
                selected_indices: BTreeSet::from([index]),
                resolved: true,
            },
        );
        next
    }

    /// A hand edit settles the field: selection cleared, provenance manual,
    /// resolved. Paths without provenance are left alone.
    pub fn mark_manual(&self, path: &FieldPath) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(path) {
            entry.filename = MANUAL_SOURCE.to_string();
            entry.page_number = PAGE_NOT_AVAILABLE.to_string();
            entry.selected_indices.clear();
            entry.resolved = true;
        }
        next
    }

    /// Entries still awaiting adjudication.
    pub fn active_conflict_count(&self) -> usize {
        self.entries.values().filter(|e| !e.resolved).count()
    }

    /// Fields a user must adjudicate: more than one candidate and unresolved.
    pub fn conflicts<'a>(&'a self, ledger: &'a CandidateLedger) -> impl Iterator<Item = &'a FieldPath> + 'a {
        self.entries
            .iter()
            .filter(move |(path, entry)| !entry.resolved && ledger.get(path).len() > 1)
            .map(|(path, _)| path)
    }
}
