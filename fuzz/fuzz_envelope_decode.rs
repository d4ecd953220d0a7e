//! Fuzz target for the queue envelope decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_envelope_decode
//!
//! The daemon decodes whatever bytes arrive on its message queue; foreign
//! traffic must be rejected cleanly, never panic the drain loop.

#![no_main]

use libfuzzer_sys::fuzz_target;
use smsgated_core::message::QueueEnvelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(QueueEnvelope::Send(request)) = QueueEnvelope::decode(data) {
        // Anything that decodes must re-encode
        let _ = QueueEnvelope::Send(request).encode();
    }
});
