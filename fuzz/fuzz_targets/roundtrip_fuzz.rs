#![no_main]
use libfuzzer_sys::fuzz_target;
use gcdelta::{DeltaIndex, IndexConfig, apply_delta};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // First byte picks a sampling budget, second the source/target split.
    let budget = (data[0] as usize) * 16;
    let split = 2 + (data[1] as usize % (data.len() - 2));
    let source = &data[2..split];
    let target = &data[split..];

    let mut index = DeltaIndex::with_config(IndexConfig::with_max_bytes_to_index(budget));
    index.add_source(source, 0).unwrap();
    let delta = index.make_delta(target).unwrap();

    let decoded = apply_delta(source, &delta).unwrap();
    assert_eq!(decoded, target);
});
