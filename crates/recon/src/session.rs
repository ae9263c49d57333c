//! Stateful shell around [`reconcile`]: holds the current snapshot,
//! persists after each change and notifies observers.
//!
//! Every change publishes a new `Arc<MemoState>`; readers holding an older
//! snapshot never see a partial update. Methods take `&mut self`, so batches
//! reconcile one at a time.

use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::reconcile;
use crate::error::ReconError;
use crate::extract::{Extractor, SourceFile};
use crate::model::{BatchReceipt, ExtractionBatch, MemoState, ReconcileReport};
use crate::path::{self, FieldPath};
use crate::policy::PolicyTable;
use crate::store::MemoStore;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(Arc<MemoState>),
    /// The one user-visible failure: an extraction that produced no batch.
    ExtractionFailed { message: String },
}

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

pub struct MemoSession {
    state: Arc<MemoState>,
    policies: PolicyTable,
    store: Option<Box<dyn MemoStore + Send>>,
    observers: Vec<Observer>,
}

impl MemoSession {
    /// Ephemeral session with no persistence.
    pub fn new(policies: PolicyTable) -> Self {
        Self {
            state: Arc::new(MemoState::default()),
            policies,
            store: None,
            observers: Vec::new(),
        }
    }

    /// Session backed by `store`, resuming whatever state it holds.
    pub fn with_store(policies: PolicyTable, store: Box<dyn MemoStore + Send>) -> Self {
        let state = match store.load() {
            Ok(Some(state)) => {
                info!(
                    batches = state.batches_applied,
                    fields = state.extracted_field_count(),
                    "resumed memo state"
                );
                state
            }
            Ok(None) => MemoState::default(),
            Err(e) => {
                warn!(error = %e, "could not load stored memo state, starting empty");
                MemoState::default()
            }
        };
        Self {
            state: Arc::new(state),
            policies,
            store: Some(store),
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn snapshot(&self) -> Arc<MemoState> {
        Arc::clone(&self.state)
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Raw files previously saved through this session's store.
    pub fn files(&self) -> Vec<SourceFile> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        store.load_files().unwrap_or_else(|e| {
            warn!(error = %e, "could not load stored files");
            Vec::new()
        })
    }

    /// Save `files`, run the extractor over them and reconcile the result.
    ///
    /// Any failure leaves the state as it was and emits a single
    /// [`SessionEvent::ExtractionFailed`].
    pub fn ingest(&mut self, extractor: &dyn Extractor, files: &[SourceFile]) -> Result<ReconcileReport, ReconError> {
        if let Some(store) = self.store.as_mut() {
            for file in files {
                if let Err(e) = store.save_file(file) {
                    warn!(file = %file.name, error = %e, "could not persist uploaded file");
                }
            }
        }

        let outcome = extractor
            .extract(files)
            .map_err(ReconError::from)
            .and_then(|batch| self.apply_batch(&batch));

        if let Err(e) = &outcome {
            warn!(files = files.len(), error = %e, "extraction failed");
            self.notify(&SessionEvent::ExtractionFailed { message: e.to_string() });
        }
        outcome
    }

    /// Reconcile an already-extracted batch into the current state.
    pub fn apply_batch(&mut self, batch: &ExtractionBatch) -> Result<ReconcileReport, ReconError> {
        let (mut next, report) = reconcile(&self.state, batch, &self.policies)?;
        next.history.push(BatchReceipt {
            batch: report.batch,
            applied_at: chrono::Utc::now().to_rfc3339(),
            fields: report.fields_touched,
        });
        self.publish(next);
        Ok(report)
    }

    /// Flip a candidate in or out of the field's composed value and write
    /// the composed value into the record.
    pub fn toggle_candidate(&mut self, path: &FieldPath, index: usize) -> Result<Value, ReconError> {
        let (tracker, composed) = self.state.tracker.toggle_candidate(&self.state.ledger, path, index)?;
        let record = path::set(&self.state.record, path, composed.clone())?;
        self.publish(MemoState {
            record,
            tracker,
            ..(*self.state).clone()
        });
        Ok(composed)
    }

    /// Mark the field's conflict as adjudicated. Returns false for a path
    /// with no provenance, which is left untouched.
    pub fn resolve(&mut self, path: &FieldPath) -> bool {
        if self.state.tracker.get(path).is_none() {
            return false;
        }
        let tracker = self.state.tracker.resolve(path);
        self.publish(MemoState {
            tracker,
            ..(*self.state).clone()
        });
        true
    }

    /// Direct edit that bypasses candidates. A field with provenance is
    /// settled as a manual entry; its candidates stay available.
    pub fn set_field(&mut self, path: &FieldPath, value: Value) -> Result<(), ReconError> {
        let record = path::set(&self.state.record, path, value)?;
        let tracker = self.state.tracker.mark_manual(path);
        self.publish(MemoState {
            record,
            tracker,
            ..(*self.state).clone()
        });
        Ok(())
    }

    pub fn get_field(&self, path: &FieldPath) -> Option<&Value> {
        path::get(&self.state.record, path)
    }

    /// Count of fields awaiting adjudication.
    pub fn active_conflict_count(&self) -> usize {
        self.state.active_conflict_count()
    }

    /// Fields with several candidates that are still unresolved.
    pub fn conflicts(&self) -> Vec<FieldPath> {
        self.state.tracker.conflicts(&self.state.ledger).cloned().collect()
    }

    pub fn extracted_field_count(&self) -> usize {
        self.state.extracted_field_count()
    }

    /// Drop all state and stored files.
    pub fn clear(&mut self) {
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.clear() {
                warn!(error = %e, "could not clear store");
            }
        }
        self.state = Arc::new(MemoState::default());
        let event = SessionEvent::StateChanged(self.snapshot());
        self.notify(&event);
    }

    fn publish(&mut self, next: MemoState) {
        self.state = Arc::new(next);
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save(&self.state) {
                warn!(error = %e, "could not persist memo state");
            }
        }
        let event = SessionEvent::StateChanged(self.snapshot());
        self.notify(&event);
    }

    fn notify(&mut self, event: &SessionEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, StoreError};
    use crate::ledger::Candidate;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    fn p(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    fn rating_batch(value: &str, file: &str, page: &str) -> ExtractionBatch {
        let path = p("riskAssessment.borrowerRating.proposedBrr");
        let data = path::set(&Value::empty_object(), &path, Value::text(value)).unwrap();
        ExtractionBatch {
            data,
            ..ExtractionBatch::default()
        }
        .with_candidates(path, vec![Candidate::new(value, file, page)])
    }

    struct FailingStore;

    impl MemoStore for FailingStore {
        fn save(&mut self, _: &MemoState) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        fn load(&self) -> Result<Option<MemoState>, StoreError> {
            Err(StoreError::Backend("unreadable".into()))
        }
        fn save_file(&mut self, _: &SourceFile) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        fn load_files(&self) -> Result<Vec<SourceFile>, StoreError> {
            Ok(Vec::new())
        }
        fn clear(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn extraction_failure_notifies_once_and_keeps_state() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut session = MemoSession::new(PolicyTable::default());
        session.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        let before = session.snapshot();

        let failing = |_: &[SourceFile]| -> Result<ExtractionBatch, ExtractionError> {
            Err(ExtractionError::Failed("model timeout".into()))
        };
        let err = session.ingest(&failing, &[]).unwrap_err();
        assert!(matches!(err, ReconError::Extraction(_)));
        assert_eq!(*session.snapshot(), *before);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], SessionEvent::ExtractionFailed { message } if message.contains("model timeout")));
    }

    #[test]
    fn malformed_batch_is_reported_as_extraction_failure() {
        let failures = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&failures);
        let mut session = MemoSession::new(PolicyTable::default());
        session.subscribe(move |e| {
            if matches!(e, SessionEvent::ExtractionFailed { .. }) {
                *sink.lock().unwrap() += 1;
            }
        });
        let bad = |_: &[SourceFile]| -> Result<ExtractionBatch, ExtractionError> {
            Ok(ExtractionBatch {
                data: Value::text("not a record"),
                ..ExtractionBatch::default()
            })
        };
        assert!(matches!(session.ingest(&bad, &[]), Err(ReconError::MalformedBatch(_))));
        assert_eq!(*failures.lock().unwrap(), 1);
        assert_eq!(session.snapshot().batches_applied, 0);
    }

    #[test]
    fn snapshots_are_independent() {
        let mut session = MemoSession::new(PolicyTable::default());
        session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        let first = session.snapshot();
        session.apply_batch(&rating_batch("3B-", "ca.pdf", "12")).unwrap();
        assert_eq!(first.ledger.len(), 1);
        assert_eq!(first.ledger.get(&p("riskAssessment.borrowerRating.proposedBrr")).len(), 1);
        assert_eq!(session.snapshot().history.len(), 2);
    }

    #[test]
    fn toggle_writes_composed_value_into_record() {
        let path = p("riskAssessment.borrowerRating.proposedBrr");
        let mut session = MemoSession::new(PolicyTable::default());
        session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        session.apply_batch(&rating_batch("3B-", "ca.pdf", "12")).unwrap();
        assert_eq!(session.conflicts(), vec![path.clone()]);

        let composed = session.toggle_candidate(&path, 1).unwrap();
        assert_eq!(composed, Value::text("3B-"));
        assert_eq!(session.get_field(&path), Some(&Value::text("3B-")));
        assert_eq!(session.active_conflict_count(), 1);

        assert!(session.resolve(&path));
        assert_eq!(session.active_conflict_count(), 0);
        assert!(session.conflicts().is_empty());
        assert!(!session.resolve(&p("borrower.unknown")));
    }

    #[test]
    fn manual_edit_settles_without_dropping_candidates() {
        let path = p("riskAssessment.borrowerRating.proposedBrr");
        let mut session = MemoSession::new(PolicyTable::default());
        session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        session.apply_batch(&rating_batch("3B-", "ca.pdf", "12")).unwrap();

        session.set_field(&path, Value::text("3C")).unwrap();
        let state = session.snapshot();
        assert_eq!(session.get_field(&path), Some(&Value::text("3C")));
        assert!(state.tracker.get(&path).unwrap().resolved);
        assert_eq!(state.ledger.get(&path).len(), 2);
    }

    #[test]
    fn manual_edit_through_scalar_is_rejected() {
        let mut session = MemoSession::new(PolicyTable::default());
        session.set_field(&p("borrower"), Value::text("Acme")).unwrap();
        let err = session.set_field(&p("borrower.name"), Value::text("Acme")).unwrap_err();
        assert!(matches!(err, ReconError::Path(_)));
    }

    #[test]
    fn store_is_written_after_changes_and_resumed() {
        let mut session = MemoSession::with_store(PolicyTable::default(), Box::new(MemoryStore::new()));
        let ok = |_: &[SourceFile]| -> Result<ExtractionBatch, ExtractionError> {
            Ok(rating_batch("3B", "teaser.pdf", "4"))
        };
        let files = [SourceFile::new("teaser.pdf", "application/pdf", b"%PDF".to_vec())];
        session.ingest(&ok, &files).unwrap();
        assert_eq!(session.files(), files.to_vec());

        let Some(mut store) = session.store.take() else {
            panic!("session lost its store");
        };
        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored, *session.snapshot());

        store.save(&stored).unwrap();
        let resumed = MemoSession::with_store(PolicyTable::default(), store);
        assert_eq!(resumed.extracted_field_count(), 1);
    }

    #[test]
    fn persistence_failures_do_not_roll_back() {
        let mut session = MemoSession::with_store(PolicyTable::default(), Box::new(FailingStore));
        let report = session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        assert_eq!(report.extracted_field_count, 1);
        assert_eq!(session.extracted_field_count(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut session = MemoSession::with_store(PolicyTable::default(), Box::new(MemoryStore::new()));
        session.apply_batch(&rating_batch("3B", "teaser.pdf", "4")).unwrap();
        session.clear();
        assert_eq!(*session.snapshot(), MemoState::default());
        assert!(session.files().is_empty());
    }
}
