//! Shared test-only helpers for woahlife_core.

use crate::cipher::{EnvelopeCipher, StaticKeyProvider, KEY_LEN};
use crate::db::SearchIndex;
use crate::error::AppError;
use crate::models::SearchDocument;
use crate::Database;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// Cipher with a fixed master key.
pub(crate) fn test_cipher() -> Arc<EnvelopeCipher<StaticKeyProvider>> {
    Arc::new(EnvelopeCipher::new(StaticKeyProvider::new([42; KEY_LEN])))
}

/// Index call observed by [`RecordingIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndexCall {
    Save(SearchDocument),
    Delete(String),
}

/// In-memory index that records every mutating call and can be switched
/// into a failing state.
#[derive(Default)]
pub(crate) struct RecordingIndex {
    calls: Mutex<Vec<IndexCall>>,
    documents: Mutex<BTreeMap<String, SearchDocument>>,
    unavailable: Mutex<bool>,
}

impl RecordingIndex {
    pub(crate) fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().expect("flag lock") = unavailable;
    }

    fn check_available(&self) -> Result<(), AppError> {
        if *self.unavailable.lock().expect("flag lock") {
            return Err(AppError::StorageMessage("index offline".to_string()));
        }
        Ok(())
    }
}

impl SearchIndex for RecordingIndex {
    fn save(&self, document: &SearchDocument) -> Result<(), AppError> {
        self.check_available()?;
        self.calls
            .lock()
            .expect("calls lock")
            .push(IndexCall::Save(document.clone()));
        self.documents
            .lock()
            .expect("documents lock")
            .insert(document.object_id.clone(), document.clone());
        Ok(())
    }

    fn delete(&self, object_id: &str) -> Result<(), AppError> {
        self.check_available()?;
        self.calls
            .lock()
            .expect("calls lock")
            .push(IndexCall::Delete(object_id.to_string()));
        self.documents.lock().expect("documents lock").remove(object_id);
        Ok(())
    }

    fn get(&self, object_id: &str) -> Result<Option<SearchDocument>, AppError> {
        self.check_available()?;
        Ok(self
            .documents
            .lock()
            .expect("documents lock")
            .get(object_id)
            .cloned())
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchDocument>, AppError> {
        self.check_available()?;
        Ok(self
            .documents
            .lock()
            .expect("documents lock")
            .values()
            .cloned()
            .collect())
    }
}
