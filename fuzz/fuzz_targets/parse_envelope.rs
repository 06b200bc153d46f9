#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = tessera::Metadata::parse(text);
        let _ = tessera::SealedMessage::from_json(text);
    }
});
