//! Write path and index sync pipeline tests.

use super::*;
use crate::cipher::{EnvelopeCipher, PayloadCipher, StaticKeyProvider, KEY_LEN};
use crate::constants::DEFAULT_MAX_DOCUMENT_BYTES;
use crate::db::{JournalStore, SearchIndex};
use crate::error::{AppError, CipherError, SyncError, WriteError};
use crate::models::*;
use crate::test_support::{setup_temp_db, test_cipher, IndexCall, RecordingIndex};
use std::sync::Arc;

fn key(raw: u32) -> DateKey {
    DateKey::new(raw).expect("valid date key")
}

fn pipeline(index: Arc<RecordingIndex>, limit: usize) -> IndexSync {
    IndexSync::new(index, test_cipher(), limit)
}

fn create_event(raw: u32, entries: Vec<EntryPayload>) -> ChangeEvent {
    ChangeEvent::created(key(raw), entries)
}

#[test]
fn create_event_produces_the_documented_scenario() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);

    let outcome = sync
        .handle_change_event(&create_event(
            20240102,
            vec![EntryPayload::Plaintext("hello".to_string())],
        ))
        .expect("sync");

    assert_eq!(
        outcome,
        SyncOutcome::Indexed {
            object_id: "20240102".to_string(),
            skipped_entries: 0
        }
    );
    assert_eq!(
        index.calls(),
        vec![IndexCall::Save(SearchDocument {
            object_id: "20240102".to_string(),
            date: 1_704_153_600,
            pretty_date: "Tuesday January 02 2024".to_string(),
            entries: vec!["hello".to_string()],
        })]
    );
}

#[test]
fn replaying_an_event_produces_identical_documents() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let cipher = test_cipher();
    let event = create_event(
        20240102,
        vec![
            EntryPayload::Plaintext("hello".to_string()),
            cipher.seal_text("world").expect("seal"),
        ],
    );

    sync.handle_change_event(&event).expect("first delivery");
    sync.handle_change_event(&event).expect("redelivery");

    let calls = index.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[test]
fn mixed_plaintext_and_encrypted_entries_decrypt_in_order() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let cipher = test_cipher();
    let event = ChangeEvent::updated(
        key(20240102),
        vec![
            EntryPayload::Plaintext("hello".to_string()),
            cipher.seal_text("world").expect("seal"),
        ],
    );

    sync.handle_change_event(&event).expect("sync");
    let doc = index.get("20240102").expect("get").expect("doc");
    assert_eq!(doc.entries, vec!["hello", "world"]);
}

#[test]
fn remove_event_deletes_even_when_no_document_exists() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);

    let outcome = sync
        .handle_change_event(&ChangeEvent::removed(key(20240102)))
        .expect("delete absent");

    assert_eq!(
        outcome,
        SyncOutcome::Deleted {
            object_id: "20240102".to_string()
        }
    );
    assert_eq!(index.calls(), vec![IndexCall::Delete("20240102".to_string())]);
}

#[test]
fn non_remove_event_without_new_value_is_malformed() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let event = ChangeEvent {
        kind: EventKind::Update,
        key: key(20240102),
        new_value: None,
    };

    let err = sync.handle_change_event(&event).expect_err("malformed");
    assert!(matches!(err, SyncError::MalformedEvent(_)));
    assert!(!err.is_retryable());
    assert!(index.calls().is_empty());
}

#[test]
fn update_without_entries_field_is_a_no_op() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let event = ChangeEvent {
        kind: EventKind::Update,
        key: key(20240102),
        new_value: Some(RecordImage { entries: None }),
    };

    assert_eq!(
        sync.handle_change_event(&event).expect("no-op"),
        SyncOutcome::Unchanged
    );
    assert!(index.calls().is_empty());
}

#[test]
fn oversize_document_is_rejected_before_save() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), 10_000);
    let event = create_event(
        20240102,
        vec![EntryPayload::Plaintext("x".repeat(10_001))],
    );

    let err = sync.handle_change_event(&event).expect_err("too large");
    match err {
        SyncError::DocumentTooLarge {
            ref object_id,
            size,
            limit,
        } => {
            assert_eq!(object_id, "20240102");
            assert!(size > limit);
            assert_eq!(limit, 10_000);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_retryable());
    assert!(index.calls().is_empty());
}

#[test]
fn index_with_a_tighter_record_limit_rejects_permanently() {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let db = crate::Database::open(temp_dir.path().join("db").to_str().expect("path"), 10_000)
        .expect("open");
    let sync = IndexSync::new(Arc::new(db.index.clone()), test_cipher(), 20_000);
    let event = create_event(
        20240102,
        vec![EntryPayload::Plaintext("x".repeat(15_000))],
    );

    let err = sync.handle_change_event(&event).expect_err("index limit");
    assert!(
        matches!(err, SyncError::DocumentTooLarge { limit: 10_000, .. }),
        "unexpected error: {:?}",
        err
    );
    assert!(!err.is_retryable());
    assert!(db.index.get("20240102").expect("get").is_none());
}

#[test]
fn undecryptable_entry_is_skipped_without_dropping_siblings() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let foreign = EnvelopeCipher::new(StaticKeyProvider::new([1; KEY_LEN]))
        .seal_text("someone else's")
        .expect("seal");
    let event = create_event(
        20240102,
        vec![
            EntryPayload::Plaintext("kept".to_string()),
            foreign,
            test_cipher().seal_text("also kept").expect("seal"),
        ],
    );

    let outcome = sync.handle_change_event(&event).expect("sync");
    assert_eq!(
        outcome,
        SyncOutcome::Indexed {
            object_id: "20240102".to_string(),
            skipped_entries: 1
        }
    );
    let doc = index.get("20240102").expect("get").expect("doc");
    assert_eq!(doc.entries, vec!["kept", "also kept"]);
}

struct KeylessCipher;

impl PayloadCipher for KeylessCipher {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::KeyUnavailable("no key service".to_string()))
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::KeyUnavailable("no key service".to_string()))
    }
}

#[test]
fn missing_master_key_fails_the_whole_event_as_retryable() {
    let index = Arc::new(RecordingIndex::default());
    let sync = IndexSync::new(
        index.clone(),
        Arc::new(KeylessCipher),
        DEFAULT_MAX_DOCUMENT_BYTES,
    );
    let event = create_event(
        20240102,
        vec![
            EntryPayload::Plaintext("visible".to_string()),
            EntryPayload::Encrypted(vec![1; 100]),
        ],
    );

    let err = sync.handle_change_event(&event).expect_err("key outage");
    assert!(matches!(err, SyncError::Cipher(CipherError::KeyUnavailable(_))));
    assert!(err.is_retryable());
    assert!(index.calls().is_empty());
}

#[test]
fn plaintext_only_records_never_need_the_key() {
    let index = Arc::new(RecordingIndex::default());
    let sync = IndexSync::new(
        index.clone(),
        Arc::new(KeylessCipher),
        DEFAULT_MAX_DOCUMENT_BYTES,
    );
    sync.handle_change_event(&create_event(
        20240102,
        vec![EntryPayload::Plaintext("legacy".to_string())],
    ))
    .expect("plaintext sync");
    assert_eq!(index.calls().len(), 1);
}

#[test]
fn index_outage_surfaces_as_retryable_index_unavailable() {
    let index = Arc::new(RecordingIndex::default());
    index.set_unavailable(true);
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);

    let err = sync
        .handle_change_event(&create_event(
            20240102,
            vec![EntryPayload::Plaintext("x".to_string())],
        ))
        .expect_err("outage");
    assert!(matches!(err, SyncError::IndexUnavailable(_)));
    assert!(err.is_retryable());
}

#[test]
fn out_of_order_delivery_is_last_processed_wins() {
    let index = Arc::new(RecordingIndex::default());
    let sync = pipeline(index.clone(), DEFAULT_MAX_DOCUMENT_BYTES);
    let older = create_event(20240102, vec![EntryPayload::Plaintext("one".to_string())]);
    let newer = ChangeEvent::updated(
        key(20240102),
        vec![
            EntryPayload::Plaintext("one".to_string()),
            EntryPayload::Plaintext("two".to_string()),
        ],
    );

    sync.handle_change_event(&newer).expect("newer first");
    sync.handle_change_event(&older).expect("older redelivered");
    let doc = index.get("20240102").expect("get").expect("doc");
    assert_eq!(doc.entries, vec!["one"]);
}

#[test]
fn append_entry_creates_then_appends_in_call_order() {
    let (db, _temp) = setup_temp_db();
    let db = Arc::new(db);
    let store: Arc<dyn JournalStore> =
        Arc::new(crate::db::EntryDb::new(db.db.clone()).expect("store"));
    let writer = EntryWriter::new(store.clone(), None, 1024);

    let first = writer.append_entry(20240102, "morning").expect("create");
    assert!(first.created);
    assert_eq!(first.entry_count, 1);
    let second = writer.append_entry(20240102, "evening").expect("append");
    assert!(!second.created);
    assert_eq!(second.entry_count, 2);

    let record = store.get(key(20240102)).expect("get").expect("record");
    assert_eq!(
        record.entries,
        vec![
            EntryPayload::Plaintext("morning".to_string()),
            EntryPayload::Plaintext("evening".to_string()),
        ]
    );
}

#[test]
fn append_entry_rejects_invalid_input_without_writing() {
    let (db, _temp) = setup_temp_db();
    let db = Arc::new(db);
    let store = Arc::new(crate::db::EntryDb::new(db.db.clone()).expect("store"));
    let writer = EntryWriter::new(store.clone(), None, 8);

    assert!(matches!(
        writer.append_entry(20241301, "text"),
        Err(WriteError::InvalidDateKey(20241301))
    ));
    assert!(matches!(
        writer.append_entry(20240102, "   \n"),
        Err(WriteError::EmptyEntry)
    ));
    assert!(matches!(
        writer.append_entry(20240102, "far too long"),
        Err(WriteError::EntryTooLarge { max: 8 })
    ));
    assert!(store.get(key(20240102)).expect("get").is_none());
    assert_eq!(db.changes.pending_count().expect("count"), 0);
}

#[test]
fn encrypted_writes_flow_through_the_change_log_into_the_index() {
    let (db, _temp) = setup_temp_db();
    let db = Arc::new(db);
    let cipher = test_cipher();
    let store = Arc::new(crate::db::EntryDb::new(db.db.clone()).expect("store"));
    let writer = EntryWriter::new(
        store.clone(),
        Some(cipher.clone() as Arc<dyn PayloadCipher>),
        1024,
    );
    let index = Arc::new(
        crate::db::IndexDb::new(db.db.clone(), DEFAULT_MAX_DOCUMENT_BYTES).expect("index"),
    );
    let sync = IndexSync::new(index.clone(), cipher, DEFAULT_MAX_DOCUMENT_BYTES);

    writer.append_entry(20240102, "first thought").expect("write");
    writer.append_entry(20240102, "second thought").expect("write");

    let stored = store.get(key(20240102)).expect("get").expect("record");
    assert!(stored.entries.iter().all(EntryPayload::is_encrypted));

    for (sequence, event) in db.changes.pending(10).expect("pending") {
        sync.handle_change_event(&event).expect("sync");
        db.changes.ack(sequence).expect("ack");
    }

    let doc = index.get("20240102").expect("get").expect("doc");
    assert_eq!(doc.entries, vec!["first thought", "second thought"]);
    assert_eq!(index.search("second", 5).expect("search"), vec![doc]);
}

struct OfflineStore;

impl JournalStore for OfflineStore {
    fn get(&self, _key: DateKey) -> Result<Option<JournalRecord>, AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }

    fn put(&self, _key: DateKey, _entries: Vec<EntryPayload>) -> Result<(), AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }

    fn append(&self, _key: DateKey, _entries: Vec<EntryPayload>) -> Result<usize, AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }

    fn append_or_create(
        &self,
        _key: DateKey,
        _entry: EntryPayload,
    ) -> Result<AppendOutcome, AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }

    fn delete(&self, _key: DateKey) -> Result<bool, AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }

    fn list_keys(
        &self,
        _from: Option<DateKey>,
        _to: Option<DateKey>,
    ) -> Result<Vec<DateKey>, AppError> {
        Err(AppError::StorageMessage("store offline".to_string()))
    }
}

#[test]
fn store_outage_surfaces_as_store_unavailable() {
    let writer = EntryWriter::new(Arc::new(OfflineStore), None, 1024);
    assert!(matches!(
        writer.append_entry(20240102, "lost?"),
        Err(WriteError::StoreUnavailable(_))
    ));
}
