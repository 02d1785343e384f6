use super::*;
use crate::env::{env_lock, EnvGuard};
use base64::Engine;

fn cipher_with(byte: u8) -> EnvelopeCipher<StaticKeyProvider> {
    EnvelopeCipher::new(StaticKeyProvider::new([byte; KEY_LEN]))
}

#[test]
fn decrypt_reverses_encrypt_for_varied_payloads() {
    let cipher = cipher_with(7);
    let long = "dear diary ".repeat(500);
    for text in ["", "hello", "naïve café ✓", long.as_str()] {
        let sealed = cipher.encrypt(text.as_bytes()).expect("encrypt");
        assert_ne!(sealed.as_slice(), text.as_bytes());
        let opened = cipher.decrypt(&sealed).expect("decrypt");
        assert_eq!(opened, text.as_bytes());
    }
}

#[test]
fn each_encryption_uses_a_fresh_data_key() {
    let cipher = cipher_with(7);
    let first = cipher.encrypt(b"same text").expect("encrypt");
    let second = cipher.encrypt(b"same text").expect("encrypt");
    assert_ne!(first, second);
}

#[test]
fn foreign_master_key_is_a_decrypt_failure() {
    let sealed = cipher_with(1).encrypt(b"secret").expect("encrypt");
    let err = cipher_with(2).decrypt(&sealed).expect_err("wrong key must fail");
    assert!(matches!(err, CipherError::DecryptFailed(_)), "{:?}", err);
}

#[test]
fn truncated_or_tampered_blobs_are_rejected() {
    let cipher = cipher_with(3);
    let sealed = cipher.encrypt(b"secret").expect("encrypt");

    let err = cipher.decrypt(&sealed[..20]).expect_err("short blob");
    assert!(matches!(err, CipherError::DecryptFailed(_)));

    let mut tampered = sealed.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    let err = cipher.decrypt(&tampered).expect_err("tampered blob");
    assert!(matches!(err, CipherError::DecryptFailed(_)));

    let mut wrong_version = sealed;
    wrong_version[0] = 9;
    let err = cipher.decrypt(&wrong_version).expect_err("unknown version");
    assert!(matches!(err, CipherError::DecryptFailed(ref msg) if msg.contains("version")));
}

#[test]
fn open_payload_passes_plaintext_and_decrypts_binary() {
    let cipher = cipher_with(4);
    let sealed = cipher.seal_text("world").expect("seal");
    assert!(sealed.is_encrypted());
    assert_eq!(
        cipher
            .open_payload(&EntryPayload::Plaintext("hello".to_string()))
            .expect("plaintext"),
        "hello"
    );
    assert_eq!(cipher.open_payload(&sealed).expect("decrypt"), "world");
}

#[test]
fn env_key_is_resolved_at_call_time() {
    let _lock = env_lock().lock().expect("env lock");
    let var = "WOAHLIFE_TEST_MASTER_KEY_CALL_TIME";
    let cipher = EnvelopeCipher::from_reference(&MasterKeyRef::Env(var.to_string()));

    {
        let _unset = EnvGuard::remove(var);
        let err = cipher.encrypt(b"x").expect_err("missing key");
        assert!(matches!(err, CipherError::KeyUnavailable(_)));
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode([5u8; KEY_LEN]);
    let _set = EnvGuard::set(var, &encoded);
    let sealed = cipher.encrypt(b"late key").expect("encrypt");
    assert_eq!(cipher.decrypt(&sealed).expect("decrypt"), b"late key");
}

#[test]
fn malformed_keys_are_unavailable_not_fatal_panics() {
    let _lock = env_lock().lock().expect("env lock");
    let var = "WOAHLIFE_TEST_MASTER_KEY_MALFORMED";
    let provider = EnvKeyProvider::new(var);

    let _bad = EnvGuard::set(var, "not base64 !!");
    assert!(matches!(
        provider.master_key(),
        Err(CipherError::KeyUnavailable(_))
    ));

    let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
    let _short = EnvGuard::set(var, &short);
    assert!(matches!(
        provider.master_key(),
        Err(CipherError::KeyUnavailable(ref msg)) if msg.contains("16 bytes")
    ));
}

#[test]
fn file_key_provider_reads_trimmed_base64() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let path = dir.path().join("master.key");
    let encoded = base64::engine::general_purpose::STANDARD.encode([8u8; KEY_LEN]);
    std::fs::write(&path, format!("{}\n", encoded)).expect("write key");

    let provider = FileKeyProvider::new(&path);
    assert_eq!(provider.master_key().expect("key"), [8u8; KEY_LEN]);

    let missing = FileKeyProvider::new(dir.path().join("absent.key"));
    assert!(matches!(
        missing.master_key(),
        Err(CipherError::KeyUnavailable(_))
    ));
}
