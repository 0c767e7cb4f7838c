// Copy/insert instructions and the opcode byte layout.
//
// An opcode with bit 7 clear is an insert of 1..=127 literal bytes. An
// opcode with bit 7 set is a copy: bits 0-3 flag which offset bytes follow,
// bits 4-5 (and the legacy bit 6) flag which length bytes follow. Absent
// bytes are zero, and a length of zero means 64 KiB.

use bitflags::bitflags;

use crate::error::{DeltaError, Result};

/// Longest literal run a single insert opcode can carry.
pub const MAX_INSERT_SIZE: usize = 0x7F;

/// Longest range a single copy opcode can carry.
pub const MAX_COPY_SIZE: usize = 0x10000;

bitflags! {
    /// Opcode bits for a copy instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CopyFlags: u8 {
        const OFFSET1 = 0x01;
        const OFFSET2 = 0x02;
        const OFFSET3 = 0x04;
        const OFFSET4 = 0x08;
        const LENGTH1 = 0x10;
        const LENGTH2 = 0x20;
        /// Never emitted; accepted on decode for older streams.
        const LENGTH3 = 0x40;
        const COPY = 0x80;
    }
}

impl CopyFlags {
    const OFFSET_BITS: [CopyFlags; 4] = [
        CopyFlags::OFFSET1,
        CopyFlags::OFFSET2,
        CopyFlags::OFFSET3,
        CopyFlags::OFFSET4,
    ];
    const LENGTH_BITS: [CopyFlags; 3] = [CopyFlags::LENGTH1, CopyFlags::LENGTH2, CopyFlags::LENGTH3];

    /// Number of payload bytes that follow an opcode with these flags.
    #[inline]
    pub fn payload_len(self) -> usize {
        (self.bits() & 0x7F).count_ones() as usize
    }
}

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Literal bytes taken from the delta itself.
    Insert(&'a [u8]),
    /// Bytes copied from the logical source address space.
    Copy { offset: u32, length: usize },
}

impl Instruction<'_> {
    /// Number of target bytes this instruction produces.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Instruction::Insert(data) => data.len(),
            Instruction::Copy { length, .. } => *length,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Copy opcode codec
// ---------------------------------------------------------------------------

/// Append a copy opcode for `offset`/`length` to `out`.
///
/// `length` must be in `1..=MAX_COPY_SIZE`; a length of exactly 64 KiB is
/// written with no length bytes at all.
pub fn write_copy_instruction(out: &mut Vec<u8>, offset: u32, length: usize) {
    debug_assert!(length > 0 && length <= MAX_COPY_SIZE);
    let op_pos = out.len();
    out.push(0);
    let mut flags = CopyFlags::COPY;

    for (i, flag) in CopyFlags::OFFSET_BITS.iter().enumerate() {
        let b = (offset >> (8 * i)) as u8;
        if b != 0 {
            flags |= *flag;
            out.push(b);
        }
    }
    if length != MAX_COPY_SIZE {
        for (i, flag) in CopyFlags::LENGTH_BITS[..2].iter().enumerate() {
            let b = (length >> (8 * i)) as u8;
            if b != 0 {
                flags |= *flag;
                out.push(b);
            }
        }
    }
    out[op_pos] = flags.bits();
}

/// Encode a copy instruction into a fresh buffer.
pub fn encode_copy_instruction(offset: u32, length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(7);
    write_copy_instruction(&mut out, offset, length);
    out
}

/// Decode the payload of copy opcode `cmd`, which starts at `pos`.
/// Returns `(offset, length, new_pos)`.
pub fn decode_copy_instruction(data: &[u8], cmd: u8, mut pos: usize) -> Result<(u32, usize, usize)> {
    let flags = CopyFlags::from_bits_retain(cmd);
    if !flags.contains(CopyFlags::COPY) {
        return Err(DeltaError::corrupt(format!("opcode {cmd:#04x} is not a copy")));
    }
    if pos + flags.payload_len() > data.len() {
        return Err(DeltaError::truncated("copy payload", data.len()));
    }

    let mut offset: u32 = 0;
    for (i, flag) in CopyFlags::OFFSET_BITS.iter().enumerate() {
        if flags.contains(*flag) {
            offset |= u32::from(data[pos]) << (8 * i);
            pos += 1;
        }
    }
    let mut length: usize = 0;
    for (i, flag) in CopyFlags::LENGTH_BITS.iter().enumerate() {
        if flags.contains(*flag) {
            length |= usize::from(data[pos]) << (8 * i);
            pos += 1;
        }
    }
    if length == 0 {
        length = MAX_COPY_SIZE;
    }
    Ok((offset, length, pos))
}

// ---------------------------------------------------------------------------
// Instruction stream
// ---------------------------------------------------------------------------

/// Iterator over the instructions following a delta's length header.
///
/// Stops after the first error.
pub struct InstructionIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> InstructionIter<'a> {
    /// Iterate over `data[pos..]`, which must start on an opcode boundary.
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            failed: false,
        }
    }

    /// Offset of the next opcode in the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_instruction(&mut self) -> Result<Instruction<'a>> {
        let cmd = self.data[self.pos];
        let at = self.pos;
        self.pos += 1;
        if cmd & 0x80 != 0 {
            let (offset, length, pos) = decode_copy_instruction(self.data, cmd, self.pos)?;
            self.pos = pos;
            Ok(Instruction::Copy { offset, length })
        } else if cmd == 0 {
            Err(DeltaError::corrupt(format!("reserved opcode 0x00 at offset {at}")))
        } else {
            let end = self.pos + cmd as usize;
            let literal = self
                .data
                .get(self.pos..end)
                .ok_or_else(|| DeltaError::truncated("insert literal", self.data.len()))?;
            self.pos = end;
            Ok(Instruction::Insert(literal))
        }
    }
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let item = self.next_instruction();
        self.failed = item.is_err();
        Some(item)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
