#![no_main]
use libfuzzer_sys::fuzz_target;
use snapwire::snapshot::decode_snapshot;
use snapwire::wire::ParseState;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decode_snapshot(data.to_vec());

    // Entry points that do not start at a record boundary.
    let mut state = ParseState::new(data.to_vec());
    if state.read_array().is_err() {
        assert_eq!(state.position(), 0);
    }
    let mut state = ParseState::new(data.to_vec());
    if state.possibly_read_descriptions(true).is_err() {
        assert_eq!(state.position(), 0);
        assert!(state.registry().is_empty());
    }
});
