use tracing::{debug, info, warn};

use crate::error::ReconError;
use crate::ledger::Candidate;
use crate::merge::deep_merge;
use crate::model::{ExtractionBatch, MemoState, ReconcileReport};
use crate::path::{is_filled, set};
use crate::policy::{select_longest, ConflictPolicy, PolicyTable};
use crate::tracker::SourceRecord;

/// Fold one extraction batch into `state`, returning the next state.
///
/// 1. Merge the batch's partial record (sequences replaced wholesale).
/// 2. Per candidate path: append new candidates, then update provenance and
///    the conflict flag against the record as it was before the merge.
/// 3. Apply automatic policies to multi-candidate fields. A field whose
///    chosen value does not fit the record's shape stays open for review.
/// 4. Report the extracted field count.
///
/// The input state is never modified; on error nothing is committed.
pub fn reconcile(
    state: &MemoState,
    batch: &ExtractionBatch,
    policies: &PolicyTable,
) -> Result<(MemoState, ReconcileReport), ReconError> {
    batch.validate()?;

    let batch_id = state.batches_applied + 1;
    let previous = &state.record;
    let mut record = deep_merge(previous, &batch.data);
    let mut ledger = state.ledger.clone();
    let mut tracker = state.tracker.clone();
    let mut report = ReconcileReport {
        batch: batch_id,
        ..ReconcileReport::default()
    };

    for (path, incoming) in &batch.field_candidates {
        let was_previously_filled = is_filled(previous, path);
        let stamped: Vec<Candidate> = incoming.iter().cloned().map(|c| c.in_batch(batch_id)).collect();

        let before = ledger.get(path).len();
        ledger = ledger.add_candidates(path, &stamped);
        let added = ledger.get(path).len() - before;
        report.candidates_added += added;
        report.fields_touched += 1;

        let Some(source) = batch
            .field_sources
            .get(path)
            .cloned()
            .or_else(|| incoming.first().map(SourceRecord::from_candidate))
        else {
            debug!(path = %path, "no candidates or provenance reported");
            continue;
        };

        let was_open = tracker.get(path).is_some_and(|e| !e.resolved);
        tracker = tracker.record_batch(path, &source, was_previously_filled);
        let is_open = tracker.get(path).is_some_and(|e| !e.resolved);
        if is_open && !was_open {
            report.conflicts_opened.push(path.clone());
        }

        debug!(
            path = %path,
            added,
            total = ledger.get(path).len(),
            was_previously_filled,
            resolved = !is_open,
            "field reconciled"
        );
    }

    for path in batch.field_candidates.keys() {
        if policies.policy_for(path) != ConflictPolicy::PreferLongest {
            continue;
        }
        let candidates = ledger.get(path);
        if candidates.len() < 2 {
            continue;
        }
        let Some(index) = select_longest(candidates) else {
            continue;
        };
        let chosen = &candidates[index];
        match set(&record, path, chosen.value.clone()) {
            Ok(updated) => {
                record = updated;
                tracker = tracker.select_only(path, index, chosen);
                report.conflicts_opened.retain(|p| p != path);
                report.auto_resolved.push(path.clone());
                debug!(path = %path, index, "auto-resolved to longest candidate");
            }
            Err(e) => {
                // The record's shape does not fit the path; leave it to the reviewer.
                warn!(path = %path, error = %e, "cannot write auto-resolved value, leaving field for review");
                let was_open = tracker.get(path).is_some_and(|entry| !entry.resolved);
                tracker = tracker.reopen(path);
                if !was_open && tracker.get(path).is_some() {
                    report.conflicts_opened.push(path.clone());
                }
            }
        }
    }

    report.extracted_field_count = tracker.len();

    info!(
        batch = batch_id,
        fields = report.fields_touched,
        candidates_added = report.candidates_added,
        conflicts_opened = report.conflicts_opened.len(),
        auto_resolved = report.auto_resolved.len(),
        extracted = report.extracted_field_count,
        "batch reconciled"
    );

    let next = MemoState {
        record,
        ledger,
        tracker,
        batches_applied: batch_id,
        history: state.history.clone(),
    };
    Ok((next, report))
}
