#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use tessera::{KeyStore, SecureMessage, SecureMessageConfig};

const KEY: [u8; 32] = [0x42; 32];

static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
});

static ENDPOINT: Lazy<SecureMessage> = Lazy::new(|| {
    SecureMessage::with_key(
        "fuzz.target",
        KEY.to_vec().into(),
        &SecureMessageConfig::default(),
        Arc::new(KeyStore::new()),
    )
    .unwrap()
});

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let a = (data[0] as usize) % (data.len() + 1);
    let b = if data.len() > 1 { (data[1] as usize) % (data.len() + 1) } else { 0 };
    let (i, j) = if a <= b { (a, b) } else { (b, a) };

    let Ok(metadata) = std::str::from_utf8(&data[..i]) else { return };
    let body = &data[i..j];
    let signature = &data[j..];

    let _ = RUNTIME.block_on(ENDPOINT.decode("1.0", metadata, body, signature));
});
