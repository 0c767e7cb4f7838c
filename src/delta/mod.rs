// Binary delta format.
//
//   delta       := varint(target_len) instruction*
//   instruction := insert | copy
//   insert      := len:u8 (1..=127) literal[len]
//   copy        := 0x80|flags offset[0..4] length[0..2]
//
// Offsets address the logical concatenation of every indexed source.

pub mod decoder;
pub mod encoder;
pub mod instruction;
pub mod varint;

pub use decoder::{DeltaSummary, apply_delta, apply_delta_to_source, summarize};
pub use instruction::{
    CopyFlags, Instruction, InstructionIter, MAX_COPY_SIZE, MAX_INSERT_SIZE,
    decode_copy_instruction, encode_copy_instruction,
};
pub use varint::{decode_base128, encode_base128};
