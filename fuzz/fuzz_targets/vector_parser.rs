#![no_main]
use atrion_core::{PhysicsVector, SyncEnvelope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The wire parser must reject arbitrary bytes without panicking.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<PhysicsVector>(s);
        let _ = serde_json::from_str::<SyncEnvelope>(s);
    }
});
