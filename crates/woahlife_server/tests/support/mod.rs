//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use woahlife_core::cipher::{StaticKeyProvider, KEY_LEN};
use woahlife_core::{EnvelopeCipher, PayloadCipher};
use woahlife_server::{create_app, AppState, Config, Database, SyncWorker};

pub(crate) const TEST_KEY: [u8; KEY_LEN] = [11; KEY_LEN];

pub(crate) fn test_cipher() -> Arc<dyn PayloadCipher> {
    Arc::new(EnvelopeCipher::new(StaticKeyProvider::new(TEST_KEY)))
}

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        max_entry_size: 10_000,
        ..Config::with_db_path(db_path.to_str().expect("db path"))
    }
}

pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _temp: TempDir,
}

impl TestApp {
    /// Deliver everything the writes so far have queued, as the background worker would.
    pub async fn drain(&self) {
        SyncWorker::from_state(&self.state)
            .drain_once()
            .await
            .expect("drain change log");
    }
}

pub(crate) fn setup_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    setup_test_app_with_state(adjust, |_| {})
}

/// Like [`setup_test_app_with`], with a hook to swap collaborators in the state.
pub(crate) fn setup_test_app_with_state(
    adjust: impl FnOnce(&mut Config),
    replace: impl FnOnce(&mut AppState),
) -> TestApp {
    let temp = TempDir::new().expect("temp dir");
    let mut config = test_config_for_db_path(&temp.path().join("db"));
    adjust(&mut config);
    let db = Database::open(&config.db_path, config.max_document_bytes).expect("open db");
    let mut state = AppState::with_cipher(config, db, test_cipher());
    replace(&mut state);
    let server = TestServer::new(create_app(state.clone(), false)).expect("server");
    TestApp {
        server,
        state,
        _temp: temp,
    }
}

pub(crate) fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {})
}
