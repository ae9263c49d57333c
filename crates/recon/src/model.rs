use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::ledger::{Candidate, CandidateLedger};
use crate::path::FieldPath;
use crate::tracker::{SourceRecord, SourceTracker};
use crate::value::Value;

/// Sequence number of an applied batch, starting at 1.
pub type BatchId = u64;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One unit of output from the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionBatch {
    /// Partial record to merge into the memo.
    #[serde(default = "Value::empty_object")]
    pub data: Value,
    #[serde(default)]
    pub field_candidates: BTreeMap<FieldPath, Vec<Candidate>>,
    #[serde(default)]
    pub field_sources: BTreeMap<FieldPath, SourceRecord>,
}

impl Default for ExtractionBatch {
    fn default() -> Self {
        Self {
            data: Value::empty_object(),
            field_candidates: BTreeMap::new(),
            field_sources: BTreeMap::new(),
        }
    }
}

impl ExtractionBatch {
    /// Parse and validate a batch from the collaborator's JSON.
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        let batch: Self =
            serde_json::from_str(input).map_err(|e| ReconError::MalformedBatch(e.to_string()))?;
        batch.validate()?;
        Ok(batch)
    }

    /// The partial record must be an object; anything else would replace the
    /// whole memo on merge.
    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.data.is_object() {
            return Err(ReconError::MalformedBatch(
                "batch data must be a keyed object".into(),
            ));
        }
        Ok(())
    }

    pub fn with_candidates(mut self, path: FieldPath, candidates: Vec<Candidate>) -> Self {
        self.field_candidates.insert(path, candidates);
        self
    }

    pub fn with_source(mut self, path: FieldPath, source: SourceRecord) -> Self {
        self.field_sources.insert(path, source);
        self
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Record of one applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    pub batch: BatchId,
    /// RFC 3339 timestamp.
    pub applied_at: String,
    pub fields: usize,
}

/// Full reconciliation state: the record plus its ledger and tracker.
/// Snapshots are immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoState {
    #[serde(default = "Value::empty_object")]
    pub record: Value,
    #[serde(default)]
    pub ledger: CandidateLedger,
    #[serde(default)]
    pub tracker: SourceTracker,
    #[serde(default)]
    pub batches_applied: u64,
    #[serde(default)]
    pub history: Vec<BatchReceipt>,
}

impl Default for MemoState {
    fn default() -> Self {
        Self {
            record: Value::empty_object(),
            ledger: CandidateLedger::default(),
            tracker: SourceTracker::default(),
            batches_applied: 0,
            history: Vec::new(),
        }
    }
}

impl MemoState {
    /// Number of fields with provenance.
    pub fn extracted_field_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn active_conflict_count(&self) -> usize {
        self.tracker.active_conflict_count()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub batch: BatchId,
    pub fields_touched: usize,
    pub candidates_added: usize,
    /// Fields that were settled before this batch and now need review.
    pub conflicts_opened: Vec<FieldPath>,
    /// Fields settled by an automatic policy.
    pub auto_resolved: Vec<FieldPath>,
    pub extracted_field_count: usize,
}
