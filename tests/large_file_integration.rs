use gcdelta::engine::DeltaOptions;
use gcdelta::io::{apply_delta_file, make_delta_file};
use gcdelta::{DeltaIndex, apply_delta};
use std::io::Write;
use tempfile::NamedTempFile;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    (0..size)
        .map(|_| {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            (s >> 33) as u8
        })
        .collect()
}

#[test]
#[ignore = "multi-hundred-MB test is opt-in due runtime and memory requirements"]
fn large_file_roundtrip_with_sampling_budget() {
    let size = 256 * 1024 * 1024;
    let source_data = gen_data(size, 11);
    let mut target_data = source_data.clone();
    for off in [64 * 1024, 100 * 1024 * 1024, size - 32] {
        target_data[off..off + 12].copy_from_slice(b"mutated-blk!");
    }

    let mut source = NamedTempFile::new().unwrap();
    let mut target = NamedTempFile::new().unwrap();
    let delta = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();
    source.write_all(&source_data).unwrap();
    target.write_all(&target_data).unwrap();

    let made = make_delta_file(
        &[source.path()],
        target.path(),
        delta.path(),
        &DeltaOptions {
            max_bytes_to_index: 16 * 1024 * 1024,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(made.delta_size < made.target_size / 100);

    let applied = apply_delta_file(&[source.path()], delta.path(), output.path()).unwrap();
    assert_eq!(applied.output_size, size as u64);
    assert_eq!(std::fs::read(output.path()).unwrap(), target_data);
}

#[test]
fn copies_longer_than_64k_are_split() {
    let source = gen_data(300 * 1024, 3);
    let mut di = DeltaIndex::new_with_source(&source, 0).unwrap();
    let delta = di.make_delta(&source).unwrap();
    // Five copies: four of 64 KiB and the remainder.
    assert!(delta.len() < 32, "delta is {} bytes", delta.len());
    assert_eq!(apply_delta(&source, &delta).unwrap(), source);
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
        (&[0u8; 64], &[0u8; 200]),
        (&[7u8; 17], &[7u8; 17]),
    ];

    for (source, target) in cases {
        let mut di = DeltaIndex::new_with_source(source, 0).unwrap();
        let delta = di.make_delta(target).unwrap();
        let decoded = apply_delta(source, &delta).unwrap();
        assert_eq!(decoded, target);
    }
}
