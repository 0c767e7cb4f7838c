use gcdelta::delta::varint::sizeof_u64;
use gcdelta::engine::{DeltaOptions, make_delta_multi};
use gcdelta::hash::config::RABIN_WINDOW;
use gcdelta::{
    DeltaIndex, IndexConfig, apply_delta, decode_base128, decode_copy_instruction, encode_base128,
    encode_copy_instruction,
};
use proptest::prelude::*;

/// Low-entropy bytes so random targets share plenty of windows with sources.
fn text(max: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), Just(b'\n'), any::<u8>()], 0..max)
}

/// Target spliced from pieces of `source` and fresh bytes.
fn spliced(source: &[u8], cuts: &[(usize, usize)], glue: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(a, b) in cuts {
        if !source.is_empty() {
            let (a, b) = (a % source.len(), b % source.len());
            out.extend_from_slice(&source[a.min(b)..a.max(b)]);
        }
        out.extend_from_slice(glue);
    }
    out
}

proptest! {
    #[test]
    fn prop_make_apply_roundtrip(
        source in text(4096),
        target in text(4096),
    ) {
        let mut di = DeltaIndex::new();
        di.add_source(&source, 0).unwrap();
        let delta = di.make_delta(&target).unwrap();
        prop_assert_eq!(apply_delta(&source, &delta).unwrap(), target);
    }

    #[test]
    fn prop_spliced_target_roundtrip(
        source in text(8192),
        cuts in proptest::collection::vec((any::<usize>(), any::<usize>()), 1..8),
        glue in proptest::collection::vec(any::<u8>(), 0..40),
    ) {
        let target = spliced(&source, &cuts, &glue);
        let mut di = DeltaIndex::new();
        di.add_source(&source, 0).unwrap();
        let delta = di.make_delta(&target).unwrap();
        prop_assert_eq!(apply_delta(&source, &delta).unwrap(), target);
    }

    #[test]
    fn prop_multi_source_with_gaps(
        a in text(2048),
        b in text(2048),
        gap_a in 0usize..64,
        gap_b in 0usize..64,
        cuts in proptest::collection::vec((any::<usize>(), any::<usize>()), 1..6),
    ) {
        let mut logical = vec![0u8; gap_a];
        logical.extend_from_slice(&a);
        logical.extend(std::iter::repeat_n(0u8, gap_b));
        logical.extend_from_slice(&b);

        let target = spliced(&logical, &cuts, b"--");
        let mut di = DeltaIndex::new();
        di.add_source(&a, gap_a).unwrap();
        di.add_source(&b, gap_a + a.len() + gap_b).unwrap();
        prop_assert_eq!(di.source_offset(), logical.len());

        let delta = di.make_delta(&target).unwrap();
        prop_assert_eq!(apply_delta(&logical, &delta).unwrap(), target);
    }

    #[test]
    fn prop_chained_delta_source_roundtrip(
        base in text(2048),
        first in text(2048),
        second in text(2048),
    ) {
        let mut di = DeltaIndex::new();
        di.add_source(&base, 0).unwrap();
        let delta = di.make_delta(&first).unwrap();
        di.add_delta_source(&delta, base.len()).unwrap();

        let chained = di.make_delta(&second).unwrap();
        let logical = [base.as_slice(), delta.as_slice()].concat();
        prop_assert_eq!(apply_delta(&logical, &chained).unwrap(), second);
    }

    #[test]
    fn prop_identical_data_is_one_copy(
        source in proptest::collection::vec(any::<u8>(), 32..8192),
    ) {
        let delta = make_delta_multi(&[source.as_slice()], &source, &DeltaOptions::default()).unwrap();
        prop_assert!(delta.len() <= 8, "delta={} source={}", delta.len(), source.len());
    }

    #[test]
    fn prop_size_cap_is_honoured(
        source in text(2048),
        target in text(2048),
        cap in 1usize..256,
    ) {
        let mut di = DeltaIndex::new();
        di.add_source(&source, 0).unwrap();
        let full = di.make_delta(&target).unwrap();
        match di.make_delta_with_limit(&target, cap) {
            Some(d) => {
                prop_assert!(d.len() <= cap);
                prop_assert_eq!(d, full);
            }
            None => prop_assert!(full.len() > cap),
        }
    }

    #[test]
    fn prop_bounded_index_growth(
        seed in proptest::collection::vec(any::<u8>(), 64..256),
        repeat in 40usize..400,
        budget in 160usize..4096,
    ) {
        // Perturb each copy so windows differ.
        let source: Vec<u8> = (0..repeat)
            .flat_map(|i| seed.iter().map(move |&c| c.wrapping_add(i as u8)))
            .collect();
        let mut di = DeltaIndex::with_config(IndexConfig::with_max_bytes_to_index(budget));
        di.add_source(&source, 0).unwrap();
        di.ensure_built();
        prop_assert!(di.num_entries() <= budget / RABIN_WINDOW);
    }

    #[test]
    fn prop_base128_roundtrip(n in any::<u64>()) {
        let bytes = encode_base128(n);
        prop_assert_eq!(bytes.len(), sizeof_u64(n));
        let (value, consumed) = decode_base128(&bytes, 0).unwrap();
        prop_assert_eq!(value, n);
        prop_assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn prop_copy_instruction_roundtrip(offset in any::<u32>(), length in 1usize..=0x10000) {
        let bytes = encode_copy_instruction(offset, length);
        let (o, l, pos) = decode_copy_instruction(&bytes, bytes[0], 1).unwrap();
        prop_assert_eq!((o, l, pos), (offset, length, bytes.len()));
    }

    #[test]
    fn prop_apply_never_panics(
        source in proptest::collection::vec(any::<u8>(), 0..256),
        delta in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let _ = apply_delta(&source, &delta);
    }

    #[test]
    fn prop_bad_delta_source_leaves_index_intact(
        source in text(512),
        junk in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut di = DeltaIndex::new();
        di.add_source(&source, 0).unwrap();
        let before = (di.num_sources(), di.source_offset());
        if di.add_delta_source(&junk, source.len()).is_err() {
            prop_assert_eq!((di.num_sources(), di.source_offset()), before);
        }
    }
}
