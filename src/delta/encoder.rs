// Delta creation: greedy matching of a target against a built index.
//
// The target is scanned with a rolling 16-byte fingerprint. Each position
// probes one bucket; the longest verified candidate becomes a copy, after
// first growing it backwards over literal bytes still pending. Positions
// without a useful match become literals.

use super::instruction::{MAX_COPY_SIZE, MAX_INSERT_SIZE, write_copy_instruction};
use super::varint;
use crate::hash::config::{GOOD_ENOUGH_MATCH, MIN_MATCH, RABIN_WINDOW};
use crate::hash::rabin::RabinHash;
use crate::hash::table::HashTable;
use crate::index::SourceText;

/// Slack allowed over `max_delta_size` before giving up early: backward
/// extension can shrink the output by at most one pending insert.
const EARLY_ABORT_SLACK: usize = MAX_INSERT_SIZE + 1;

// ---------------------------------------------------------------------------
// Output buffer
// ---------------------------------------------------------------------------

/// Delta output with one open insert run.
struct DeltaWriter {
    out: Vec<u8>,
    /// Index of the open insert's length byte.
    insert_at: usize,
    /// Bytes in the open insert, 0 when none is open.
    insert_len: usize,
}

impl DeltaWriter {
    fn new(target_len: usize) -> Self {
        let mut out = Vec::with_capacity(target_len / 2 + 16);
        varint::write_usize(&mut out, target_len);
        Self {
            out,
            insert_at: 0,
            insert_len: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.out.len()
    }

    #[inline]
    fn pending(&self) -> usize {
        self.insert_len
    }

    /// Append a literal byte, closing the run once it is full.
    #[inline]
    fn literal(&mut self, b: u8) {
        if self.insert_len == 0 {
            self.insert_at = self.out.len();
            self.out.push(0);
        }
        self.out.push(b);
        self.insert_len += 1;
        if self.insert_len == MAX_INSERT_SIZE {
            self.flush_insert();
        }
    }

    /// Take back the last pending literal byte.
    #[inline]
    fn unliteral(&mut self) {
        debug_assert!(self.insert_len > 0);
        self.out.pop();
        self.insert_len -= 1;
        if self.insert_len == 0 {
            // Drop the length byte of the now empty run.
            self.out.pop();
        }
    }

    fn flush_insert(&mut self) {
        if self.insert_len > 0 {
            self.out[self.insert_at] = self.insert_len as u8;
            self.insert_len = 0;
        }
    }

    fn copy(&mut self, offset: u32, length: usize) {
        debug_assert_eq!(self.insert_len, 0);
        write_copy_instruction(&mut self.out, offset, length);
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush_insert();
        self.out
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Best candidate found so far: source index, offset inside that source,
/// and verified length.
#[derive(Debug, Clone, Copy, Default)]
struct Match {
    source: usize,
    offset: usize,
    len: usize,
}

#[inline]
fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Probe the bucket for `val` and improve `best` with any longer match
/// starting at `target[data..]`.
#[inline]
fn probe(table: &HashTable, sources: &[SourceText<'_>], target: &[u8], data: usize, val: u32, best: &mut Match) {
    for entry in table.lookup(val) {
        let src = sources[entry.source as usize].data;
        let off = entry.offset as usize;
        let ref_size = src.len().saturating_sub(off).min(target.len() - data);
        // Bucket order is insertion order; stop once nothing can be longer.
        if ref_size <= best.len {
            break;
        }
        let n = common_prefix(&src[off..off + ref_size], &target[data..data + ref_size]);
        if n > best.len {
            *best = Match {
                source: entry.source as usize,
                offset: off,
                len: n,
            };
            if n >= GOOD_ENOUGH_MATCH {
                break;
            }
        }
    }
}

/// Encode `target` against the indexed `sources`.
///
/// Returns `None` when `max_delta_size` is non-zero and the delta would be
/// larger than it.
pub fn create_delta(
    table: &HashTable,
    sources: &[SourceText<'_>],
    target: &[u8],
    max_delta_size: usize,
) -> Option<Vec<u8>> {
    let top = target.len();
    let mut w = DeltaWriter::new(top);

    // The first window is always literal; it seeds the fingerprint.
    let mut hash = RabinHash::default();
    let mut data = 0;
    while data < RABIN_WINDOW && data < top {
        w.literal(target[data]);
        hash.push(target[data]);
        data += 1;
    }

    let mut best = Match::default();
    while data < top {
        if best.len < GOOD_ENOUGH_MATCH {
            hash.roll(target[data - RABIN_WINDOW], target[data]);
            probe(table, sources, target, data, hash.value(), &mut best);
        }

        if best.len < MIN_MATCH {
            w.literal(target[data]);
            data += 1;
            best.len = 0;
        } else {
            let src = &sources[best.source];
            while w.pending() > 0 && best.offset > 0 && src.data[best.offset - 1] == target[data - 1] {
                best.len += 1;
                best.offset -= 1;
                data -= 1;
                w.unliteral();
            }
            w.flush_insert();

            let len = best.len.min(MAX_COPY_SIZE);
            // Registration keeps every source end within 32 bits.
            w.copy((src.start + best.offset) as u32, len);
            data += len;
            best.offset += len;
            best.len -= len;

            if best.len < GOOD_ENOUGH_MATCH {
                let mut h = RabinHash::default();
                for &c in &target[data - RABIN_WINDOW..data] {
                    h.push(c);
                }
                hash = h;
            }
        }

        if max_delta_size > 0 && w.len() > max_delta_size + EARLY_ABORT_SLACK {
            return None;
        }
    }

    let out = w.finish();
    if max_delta_size > 0 && out.len() > max_delta_size {
        return None;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::decoder::apply_delta;
    use crate::hash::rabin::rabin_hash;
    use crate::hash::table::{IndexEntry, bucketize};

    /// Index `src` at every 16-byte boundary, the way a fulltext is sampled.
    fn index_of(src: &[u8]) -> HashTable {
        let entries = (1..=(src.len().saturating_sub(1)) / RABIN_WINDOW).map(|k| {
            let end = k * RABIN_WINDOW;
            IndexEntry {
                source: 0,
                offset: end as u32,
                val: rabin_hash(&src[end + 1 - RABIN_WINDOW..=end]),
            }
        });
        HashTable::pack(bucketize(entries, 16), None)
    }

    fn encode(src: &[u8], target: &[u8], max: usize) -> Option<Vec<u8>> {
        let sources = [SourceText { data: src, start: 0 }];
        create_delta(&index_of(src), &sources, target, max)
    }

    #[test]
    fn writer_flushes_full_inserts() {
        let mut w = DeltaWriter::new(200);
        for i in 0..200u32 {
            w.literal(i as u8);
        }
        let out = w.finish();
        // header (2) + [127 + 127 bytes] + [73 + 73 bytes]
        assert_eq!(out.len(), 2 + 1 + 127 + 1 + 73);
        assert_eq!(out[2], 127);
        assert_eq!(out[2 + 128], 73);
    }

    #[test]
    fn writer_unliteral_drops_empty_run() {
        let mut w = DeltaWriter::new(2);
        w.literal(b'a');
        w.unliteral();
        assert_eq!(w.pending(), 0);
        w.copy(0, 2);
        assert_eq!(w.finish(), b"\x02\x90\x02");
    }

    #[test]
    fn empty_target() {
        assert_eq!(encode(b"some source text here", b"", 0).unwrap(), b"\x00");
    }

    #[test]
    fn short_target_is_literal() {
        assert_eq!(encode(b"abcdefghijklmnopqrstuvwxyz", b"abc", 0).unwrap(), b"\x03\x03abc");
    }

    #[test]
    fn identity_is_a_single_copy() {
        let src: Vec<u8> = (0..300u32).map(|i| (i * 7 % 251) as u8).collect();
        let delta = encode(&src, &src, 0).unwrap();
        assert_eq!(delta, b"\xac\x02\xb0\x2c\x01");
        assert_eq!(apply_delta(&src, &delta).unwrap(), src);
    }

    #[test]
    fn size_limit() {
        let src: Vec<u8> = (0..300u32).map(|i| (i * 7 % 251) as u8).collect();
        let unrelated: Vec<u8> = (0..300u32).map(|i| (i * 13 % 241) as u8 ^ 0x80).collect();
        let full = encode(&src, &unrelated, 0).unwrap();
        assert!(encode(&src, &unrelated, full.len()).is_some());
        assert!(encode(&src, &unrelated, full.len() - 1).is_none());
        assert!(encode(&src, &unrelated, 10).is_none());
    }
}
