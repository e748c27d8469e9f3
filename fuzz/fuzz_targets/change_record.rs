#![no_main]

use libfuzzer_sys::fuzz_target;
use runstate_core::ChangeRecord;
use runstate_monitor::classify;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary frames must fail cleanly, never panic
    if let Ok(record) = ChangeRecord::decode(data) {
        let frame = record.encode().expect("decoded record re-encodes");
        assert_eq!(&frame[..], data);
        let _ = classify(&record, "/RunState");
    }
});
