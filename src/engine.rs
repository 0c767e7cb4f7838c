// One-shot delta helpers.
//
// Build a throwaway index over the given sources, encode a single target,
// and apply deltas back against the concatenated sources. Callers encoding
// many targets against the same sources should keep a `DeltaIndex` instead.

use crate::delta::decoder;
use crate::error::{DeltaError, Result};
use crate::hash::config::IndexConfig;
use crate::index::DeltaIndex;

pub use crate::delta::decoder::apply_delta;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for one-shot delta creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Sampling budget per source; 0 samples every 16 bytes.
    pub max_bytes_to_index: usize,
    /// Fail with `DeltaTooLarge` above this many bytes; 0 disables the cap.
    pub max_delta_size: usize,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode `target` against a single `source`.
pub fn make_delta(source: &[u8], target: &[u8]) -> Result<Vec<u8>> {
    make_delta_multi(&[source], target, &DeltaOptions::default())
}

/// Encode `target` against a single `source` with custom options.
pub fn make_delta_with_options(source: &[u8], target: &[u8], opts: &DeltaOptions) -> Result<Vec<u8>> {
    make_delta_multi(&[source], target, opts)
}

/// Encode `target` against `sources` laid out back to back.
///
/// With no sources the delta is all literals.
pub fn make_delta_multi(sources: &[&[u8]], target: &[u8], opts: &DeltaOptions) -> Result<Vec<u8>> {
    let mut index = DeltaIndex::with_config(IndexConfig::with_max_bytes_to_index(opts.max_bytes_to_index));
    if sources.is_empty() {
        index.add_source(&[], 0)?;
    }
    for source in sources {
        index.add_source(source, index.source_offset())?;
    }
    index
        .make_delta_with_limit(target, opts.max_delta_size)
        .ok_or(DeltaError::DeltaTooLarge {
            limit: opts.max_delta_size,
        })
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Apply `delta` against `sources` laid out back to back.
pub fn apply_delta_multi(sources: &[&[u8]], delta: &[u8]) -> Result<Vec<u8>> {
    match sources {
        [] => decoder::apply_delta(&[], delta),
        [single] => decoder::apply_delta(single, delta),
        many => decoder::apply_delta(&many.concat(), delta),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
