// File-level helpers for delta creation and application.
//
// Provides `make_delta_file()` and `apply_delta_file()`, which read sources
// and targets into memory, run the one-shot engine and write the result with
// buffered I/O. Optionally computes SHA-256 checksums (feature-gated behind
// `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::delta::decoder::summarize;
use crate::engine::{self, DeltaOptions};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `make_delta_file()`.
#[derive(Debug, Clone)]
pub struct MakeStats {
    /// Number of source files indexed.
    pub sources: usize,
    /// Combined size of all source files in bytes.
    pub source_size: u64,
    /// Target file size in bytes.
    pub target_size: u64,
    /// Delta output size in bytes.
    pub delta_size: u64,
    /// Copy instructions in the delta.
    pub copies: u64,
    /// Bytes produced by copy instructions.
    pub copy_bytes: u64,
    /// Insert instructions in the delta.
    pub inserts: u64,
    /// Bytes produced by insert instructions.
    pub insert_bytes: u64,
    /// SHA-256 of the concatenated sources (if `file-io` feature is enabled).
    pub source_sha256: Option<[u8; 32]>,
    /// SHA-256 of the target file (if `file-io` feature is enabled).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_delta_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Combined size of all source files in bytes.
    pub source_size: u64,
    /// Delta file size in bytes.
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Read every source file, in order.
fn read_sources(paths: &[&Path]) -> io::Result<Vec<Vec<u8>>> {
    paths.iter().map(std::fs::read).collect()
}

#[cfg(feature = "file-io")]
fn sha256_of<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Option<[u8; 32]> {
    let mut h = sha2::Sha256::new();
    for part in parts {
        h.update(part);
    }
    Some(h.finalize().into())
}

#[cfg(not(feature = "file-io"))]
fn sha256_of<'a>(_parts: impl IntoIterator<Item = &'a [u8]>) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// make_delta_file
// ---------------------------------------------------------------------------

/// Encode `target_path` against `source_paths`, writing the delta to
/// `delta_path`.
///
/// Sources are laid out back to back in the order given, so the same list
/// must be handed to `apply_delta_file()`.
pub fn make_delta_file(
    source_paths: &[&Path],
    target_path: &Path,
    delta_path: &Path,
    opts: &DeltaOptions,
) -> Result<MakeStats> {
    let sources = read_sources(source_paths)?;
    let source_refs: Vec<&[u8]> = sources.iter().map(Vec::as_slice).collect();
    let source_size = source_refs.iter().map(|s| s.len() as u64).sum();
    let target = std::fs::read(target_path)?;

    let delta = engine::make_delta_multi(&source_refs, &target, opts)?;
    let summary = summarize(&delta)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(delta_path)?);
    writer.write_all(&delta)?;
    writer.flush()?;

    Ok(MakeStats {
        sources: sources.len(),
        source_size,
        target_size: target.len() as u64,
        delta_size: delta.len() as u64,
        copies: summary.copies as u64,
        copy_bytes: summary.copy_bytes as u64,
        inserts: summary.inserts as u64,
        insert_bytes: summary.insert_bytes as u64,
        source_sha256: sha256_of(source_refs.iter().copied()),
        target_sha256: sha256_of([target.as_slice()]),
    })
}

// ---------------------------------------------------------------------------
// apply_delta_file
// ---------------------------------------------------------------------------

/// Apply the delta in `delta_path` against `source_paths`, writing the
/// reconstructed target to `output_path`.
///
/// Nothing is written unless the delta applies cleanly.
pub fn apply_delta_file(source_paths: &[&Path], delta_path: &Path, output_path: &Path) -> Result<ApplyStats> {
    let sources = read_sources(source_paths)?;
    let source_refs: Vec<&[u8]> = sources.iter().map(Vec::as_slice).collect();
    let source_size = source_refs.iter().map(|s| s.len() as u64).sum();
    let delta = std::fs::read(delta_path)?;

    let output = engine::apply_delta_multi(&source_refs, &delta)?;

    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        let mut output_hasher = sha2::Sha256::new();
        let mut hashing_writer = HashingWriter {
            inner: &mut output_writer,
            hasher: &mut output_hasher,
        };
        hashing_writer.write_all(&output)?;
        Some(output_hasher.finalize().into())
    };

    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = {
        output_writer.write_all(&output)?;
        None
    };

    output_writer.flush()?;

    Ok(ApplyStats {
        source_size,
        delta_size: delta.len() as u64,
        output_size: output.len() as u64,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeltaError;
    use std::path::PathBuf;

    fn write_temp_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn make_apply_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let source_data = b"The quick brown fox jumps over the lazy dog. 1234567890";
        let target_data = b"The quick brown cat sits on the lazy mat. 1234567890!!!";

        let source = write_temp_file(dir.path(), "source.bin", source_data);
        let target = write_temp_file(dir.path(), "target.bin", target_data);
        let delta = dir.path().join("delta.gcd");
        let output = dir.path().join("output.bin");

        let made = make_delta_file(&[&source], &target, &delta, &DeltaOptions::default()).unwrap();
        assert_eq!(made.sources, 1);
        assert_eq!(made.source_size, source_data.len() as u64);
        assert_eq!(made.target_size, target_data.len() as u64);
        assert_eq!(made.delta_size, std::fs::metadata(&delta).unwrap().len());
        assert_eq!(made.copy_bytes + made.insert_bytes, target_data.len() as u64);

        let applied = apply_delta_file(&[&source], &delta, &output).unwrap();
        assert_eq!(applied.output_size, target_data.len() as u64);
        assert_eq!(std::fs::read(&output).unwrap(), target_data);
    }

    #[test]
    fn multiple_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let a: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 251) as u8).collect();
        let b: Vec<u8> = (0..2000u32).map(|i| (i * 11 % 239) as u8 ^ 0x3C).collect();
        let mut target = b[500..1500].to_vec();
        target.extend_from_slice(&a[..1000]);

        let pa = write_temp_file(dir.path(), "a.bin", &a);
        let pb = write_temp_file(dir.path(), "b.bin", &b);
        let pt = write_temp_file(dir.path(), "t.bin", &target);
        let delta = dir.path().join("t.gcd");
        let output = dir.path().join("t.out");

        let made = make_delta_file(&[&pa, &pb], &pt, &delta, &DeltaOptions::default()).unwrap();
        assert_eq!(made.sources, 2);
        assert!(made.delta_size < 64, "delta is {} bytes", made.delta_size);

        apply_delta_file(&[&pa, &pb], &delta, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), target);
    }

    #[test]
    fn no_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let target_data = b"standalone data without any source";
        let target = write_temp_file(dir.path(), "target.bin", target_data);
        let delta = dir.path().join("delta.gcd");
        let output = dir.path().join("output.bin");

        let made = make_delta_file(&[], &target, &delta, &DeltaOptions::default()).unwrap();
        assert_eq!(made.copies, 0);
        apply_delta_file(&[], &delta, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), target_data);
    }

    #[test]
    fn missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_temp_file(dir.path(), "target.bin", b"data");
        let missing = dir.path().join("missing.bin");
        let err = make_delta_file(&[&missing], &target, &dir.path().join("d"), &DeltaOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeltaError::Io(_)), "{err}");
    }

    #[test]
    fn corrupt_delta_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_temp_file(dir.path(), "source.bin", b"abc");
        let delta = write_temp_file(dir.path(), "bad.gcd", b"\x05\x03abc");
        let output = dir.path().join("output.bin");

        let err = apply_delta_file(&[&source], &delta, &output).unwrap_err();
        assert!(matches!(err, DeltaError::CorruptDelta(_)), "{err}");
        assert!(!output.exists());
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_checksums_computed() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_temp_file(dir.path(), "sha_source.bin", b"source for checksum test");
        let target = write_temp_file(dir.path(), "sha_target.bin", b"target for checksum test");
        let delta = dir.path().join("sha_delta.gcd");
        let output = dir.path().join("sha_output.bin");

        let made = make_delta_file(&[&source], &target, &delta, &DeltaOptions::default()).unwrap();
        assert!(made.source_sha256.is_some());
        assert!(made.target_sha256.is_some());

        let applied = apply_delta_file(&[&source], &delta, &output).unwrap();
        // The output SHA-256 should match the target SHA-256 from encoding.
        assert_eq!(applied.output_sha256, made.target_sha256);
    }
}
