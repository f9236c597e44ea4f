#![no_main]
use libfuzzer_sys::fuzz_target;
use snapwire::snapshot::SnapshotDecoder;
use snapwire::wire::{DecodeOptions, RefScope};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte selects options; the rest is split into two buffers that
    // share one registry.
    let flags = data[0];
    let options = DecodeOptions {
        max_depth: 1 + (flags as usize & 0x3F),
        ref_scope: if flags & 0x40 != 0 {
            RefScope::Session
        } else {
            RefScope::State
        },
        verify_array_headers: flags & 0x80 == 0,
    };
    let payload = &data[1..];
    let (first, second) = payload.split_at(payload.len() / 2);

    let mut decoder = SnapshotDecoder::with_options(options);
    let _ = decoder.decode(first.to_vec());
    let known = decoder.registry().len();
    let _ = decoder.decode(second.to_vec());

    // Schemas are never forgotten.
    assert!(decoder.registry().len() >= known);
});
