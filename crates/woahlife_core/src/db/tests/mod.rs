//! Database integration tests.

use super::*;
use crate::models::{ChangeEvent, EventKind};
use crate::test_support::setup_temp_db as setup_test_db;
use tempfile::TempDir;

fn key(raw: u32) -> DateKey {
    DateKey::new(raw).expect("valid date key")
}

fn text(value: &str) -> EntryPayload {
    EntryPayload::Plaintext(value.to_string())
}
