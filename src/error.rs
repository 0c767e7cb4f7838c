// Error type shared by the index, the delta codec and the file helpers.

use std::io;

/// Errors raised while building deltas, applying them, or indexing sources.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// The input ended in the middle of a varint, opcode payload or literal.
    #[error("truncated input: {what} at offset {offset}")]
    TruncatedInput { what: &'static str, offset: usize },

    /// `apply_delta_to_source` was given a range outside the buffer.
    #[error("invalid delta range {start}..{end} for buffer of {len} bytes")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// The delta is structurally valid but semantically wrong.
    #[error("corrupt delta: {0}")]
    CorruptDelta(String),

    /// A source was placed before the end of the previous one.
    #[error("source at logical offset {start} overlaps registered sources ending at {source_offset}")]
    OverlappingSource { start: usize, source_offset: usize },

    /// A source would end past the 32-bit copy address space.
    #[error("source ending at logical offset {offset} exceeds the 32-bit copy address space")]
    OffsetOverflow { offset: u64 },

    /// The delta would be larger than the caller's size cap.
    #[error("delta exceeds the {limit} byte size limit")]
    DeltaTooLarge { limit: usize },

    /// Filesystem error from the file helpers.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeltaError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptDelta(msg.into())
    }

    pub(crate) fn truncated(what: &'static str, offset: usize) -> Self {
        Self::TruncatedInput { what, offset }
    }
}

impl From<DeltaError> for io::Error {
    fn from(e: DeltaError) -> io::Error {
        match e {
            DeltaError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T, E = DeltaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = DeltaError::InvalidRange {
            start: 5,
            end: 3,
            len: 3,
        };
        assert_eq!(
            e.to_string(),
            "invalid delta range 5..3 for buffer of 3 bytes"
        );
        assert_eq!(
            DeltaError::truncated("varint", 4).to_string(),
            "truncated input: varint at offset 4"
        );
        assert_eq!(
            DeltaError::OverlappingSource {
                start: 3,
                source_offset: 10
            }
            .to_string(),
            "source at logical offset 3 overlaps registered sources ending at 10"
        );
        assert_eq!(
            DeltaError::corrupt("zero opcode").to_string(),
            "corrupt delta: zero opcode"
        );
    }

    #[test]
    fn converts_to_io_error() {
        let e: io::Error = DeltaError::corrupt("x").into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);

        let e: io::Error = DeltaError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")).into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
