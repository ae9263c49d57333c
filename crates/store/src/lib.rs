//! `creditmemo-store` — persistence collaborators for the reconciliation core.

pub mod sqlite;

pub use creditmemo_recon::store::{MemoStore, MemoryStore};
pub use sqlite::SqliteStore;
