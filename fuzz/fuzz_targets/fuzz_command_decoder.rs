//! Fuzz target: `codec::decode_command` / `codec::encode`
//!
//! Anything that decodes as a command must encode again without error.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use callbot::remote::codec::{decode_command, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(command) = decode_command(text) {
        assert!(encode(&command).is_ok(), "decoded command failed to encode");
    }
});
