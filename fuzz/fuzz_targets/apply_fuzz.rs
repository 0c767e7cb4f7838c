#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = gcdelta::apply_delta(&[], data);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, delta) = data.split_at(split);
        let _ = gcdelta::apply_delta(source, delta);
        let _ = gcdelta::apply_delta_to_source(data, split, data.len());
    }
});
