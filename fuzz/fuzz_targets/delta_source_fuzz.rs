#![no_main]
use libfuzzer_sys::fuzz_target;
use gcdelta::{DeltaIndex, apply_delta};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // Register arbitrary bytes as a delta source; a rejected source must
    // leave the index usable and unchanged.
    let split = 1 + (data[0] as usize % (data.len() - 1));
    let (source, junk) = data[1..].split_at(split - 1);

    let mut index = DeltaIndex::new();
    index.add_source(source, 0).unwrap();
    let before = index.source_offset();

    let mut logical = source.to_vec();
    match index.add_delta_source(junk, before) {
        Ok(()) => logical.extend_from_slice(junk),
        Err(_) => assert_eq!(index.source_offset(), before),
    }

    let delta = index.make_delta(source).unwrap();
    assert_eq!(apply_delta(&logical, &delta).unwrap(), source);
});
