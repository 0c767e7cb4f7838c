// Delta application: rebuild a target from a source and a delta.

use log::trace;

use super::instruction::{Instruction, InstructionIter};
use super::varint;
use crate::error::{DeltaError, Result};

/// Reconstruct the target encoded by `delta` against `source`.
///
/// Copy offsets address `source` directly. The produced length must equal
/// the length declared in the delta header.
pub fn apply_delta(source: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let (target_len, pos) = varint::read_usize(delta)?;
    // Header length is untrusted.
    let mut out = Vec::with_capacity(target_len.min(source.len() + delta.len()));

    for ins in InstructionIter::new(delta, pos) {
        match ins? {
            Instruction::Insert(literal) => out.extend_from_slice(literal),
            Instruction::Copy { offset, length } => {
                let start = offset as usize;
                let end = start + length;
                let chunk = source.get(start..end).ok_or_else(|| {
                    DeltaError::corrupt(format!(
                        "copy {start}..{end} exceeds source of {} bytes",
                        source.len()
                    ))
                })?;
                out.extend_from_slice(chunk);
            }
        }
        if out.len() > target_len {
            return Err(DeltaError::corrupt(format!(
                "delta produces more than the declared {target_len} bytes"
            )));
        }
    }

    if out.len() != target_len {
        return Err(DeltaError::corrupt(format!(
            "delta produced {} bytes, expected {target_len}",
            out.len()
        )));
    }
    trace!("applied {} byte delta -> {} bytes", delta.len(), out.len());
    Ok(out)
}

/// Apply the delta stored at `buf[start..end]` against all of `buf`.
///
/// Used when a delta has been appended to the very buffer it copies from.
pub fn apply_delta_to_source(buf: &[u8], start: usize, end: usize) -> Result<Vec<u8>> {
    let len = buf.len();
    if start >= len || end > len || start >= end {
        return Err(DeltaError::InvalidRange { start, end, len });
    }
    apply_delta(buf, &buf[start..end])
}

/// Instruction totals of a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    /// Declared target length.
    pub target_len: usize,
    pub copies: usize,
    pub copy_bytes: usize,
    pub inserts: usize,
    pub insert_bytes: usize,
}

/// Walk the instruction stream of `delta` without a source.
pub fn summarize(delta: &[u8]) -> Result<DeltaSummary> {
    let (target_len, pos) = varint::read_usize(delta)?;
    let mut summary = DeltaSummary {
        target_len,
        ..Default::default()
    };
    for ins in InstructionIter::new(delta, pos) {
        match ins? {
            Instruction::Insert(literal) => {
                summary.inserts += 1;
                summary.insert_bytes += literal.len();
            }
            Instruction::Copy { length, .. } => {
                summary.copies += 1;
                summary.copy_bytes += length;
            }
        }
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
