//! gcdelta: group-compress delta encoding and decoding in Rust.
//!
//! The crate provides:
//! - A Rabin-fingerprint index over one or more sources (`index`, `hash`)
//! - The copy/insert delta format and its codecs (`delta`)
//! - One-shot and file-oriented helpers (`engine`, `io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use gcdelta::{DeltaIndex, apply_delta};
//!
//! let source = b"hello old world, hello old world, hello old world";
//! let target = b"hello new world, hello old world, hello old world";
//!
//! let mut index = DeltaIndex::new();
//! index.add_source(source, 0).unwrap();
//! let delta = index.make_delta(target).unwrap();
//! assert_eq!(apply_delta(source, &delta).unwrap(), target);
//! ```
//!
//! Deltas can themselves be registered as sources, so a chain of revisions
//! can be encoded without expanding earlier deltas:
//!
//! ```
//! use gcdelta::DeltaIndex;
//!
//! let base = b"line one\nline two\nline three\nline four\n".repeat(4);
//! let rev1 = b"line one\nline 2\nline three\nline four\n".repeat(4);
//!
//! let mut index = DeltaIndex::new();
//! index.add_source(&base, 0).unwrap();
//! let delta = index.make_delta(&rev1).unwrap();
//! index.add_delta_source(&delta, index.source_offset()).unwrap();
//! assert_eq!(index.num_sources(), 2);
//! ```

pub mod delta;
pub mod engine;
pub mod error;
pub mod hash;
pub mod index;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use delta::{apply_delta, apply_delta_to_source, decode_base128, decode_copy_instruction, encode_base128, encode_copy_instruction};
pub use error::{DeltaError, Result};
pub use hash::config::IndexConfig;
pub use index::{DeltaIndex, IndexDump, SourceText};
