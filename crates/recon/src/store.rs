//! Persistence collaborator boundary.

use crate::error::StoreError;
use crate::extract::SourceFile;
use crate::model::MemoState;

/// Key-value blob store for the memo state and the raw uploads.
///
/// Callers log failures and carry on; in-memory state stays authoritative.
pub trait MemoStore {
    fn save(&mut self, state: &MemoState) -> Result<(), StoreError>;
    fn load(&self) -> Result<Option<MemoState>, StoreError>;
    fn save_file(&mut self, file: &SourceFile) -> Result<(), StoreError>;
    /// Files in the order they were first saved.
    fn load_files(&self) -> Result<Vec<SourceFile>, StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-process store. State is kept serialized so a load always yields an
/// independent copy, as a real backend would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Option<String>,
    files: Vec<SourceFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoStore for MemoryStore {
    fn save(&mut self, state: &MemoState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.state = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<MemoState>, StoreError> {
        self.state
            .as_deref()
            .map(|json| serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    fn save_file(&mut self, file: &SourceFile) -> Result<(), StoreError> {
        if !self.files.iter().any(|f| f.bytes == file.bytes) {
            self.files.push(file.clone());
        }
        Ok(())
    }

    fn load_files(&self) -> Result<Vec<SourceFile>, StoreError> {
        Ok(self.files.clone())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.state = None;
        self.files.clear();
        Ok(())
    }
}
