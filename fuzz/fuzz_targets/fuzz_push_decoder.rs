//! Fuzz target: `codec::decode_push`
//!
//! Feeds arbitrary text frames to the inbound decoder. It must never
//! panic, and any state it yields must map to at most one event.
//!
//! cargo fuzz run fuzz_push_decoder

#![no_main]

use callbot::identity::UserIdentity;
use callbot::remote::codec::decode_push;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(me) = UserIdentity::new("picker_001122aabbcc") else {
        return;
    };

    if let Ok(Some(state)) = decode_push(text, &me) {
        let _ = state.event();
    }
});
