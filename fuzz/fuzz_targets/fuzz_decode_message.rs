#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary frames must decode or fail cleanly, never panic
    if let Ok(message) = duosida_direct::wire::decode_message(data) {
        for field in message.field_numbers() {
            if let Some(payload) = message.get(field).and_then(|v| v.as_payload()) {
                let _ = duosida_direct::wire::decode_message(payload);
            }
        }
    }
    let _ = duosida_direct::envelope::unwrap_frame(data, "0310107112122360374");
});
