//! `creditmemo-recon` — field-candidate reconciliation engine.
//!
//! Pure engine crate: folds extraction batches into a structured credit memo
//! record while tracking per-field candidates, provenance and conflicts.
//! Persistence and extraction are reached only through the traits in
//! [`store`] and [`extract`].

pub mod engine;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod merge;
pub mod model;
pub mod path;
pub mod policy;
pub mod session;
pub mod store;
pub mod tracker;
pub mod value;

pub use engine::reconcile;
pub use error::{ExtractionError, PathError, ReconError, StoreError};
pub use extract::{Extractor, SourceFile};
pub use ledger::{Candidate, CandidateLedger};
pub use model::{BatchId, BatchReceipt, ExtractionBatch, MemoState, ReconcileReport};
pub use path::FieldPath;
pub use policy::{ConflictPolicy, PolicyTable};
pub use session::{MemoSession, SessionEvent};
pub use store::{MemoStore, MemoryStore};
pub use tracker::{SourceRecord, SourceTracker};
pub use value::Value;
