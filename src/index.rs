// Incremental fingerprint index over one or more source buffers.
//
// Sources are placed at caller-chosen offsets in a single 32-bit address
// space, in ascending order and possibly separated by gaps. The first
// fulltext is only recorded; the table is built when a second source
// arrives or a delta is requested.

use std::fmt;

use log::{debug, trace};

use crate::delta::encoder;
use crate::delta::instruction::CopyFlags;
use crate::delta::varint;
use crate::error::{DeltaError, Result};
use crate::hash::config::{IndexConfig, MIN_TABLE_SIZE, RABIN_WINDOW};
use crate::hash::rabin::rabin_hash;
use crate::hash::table::{self, HashTable, IndexEntry};

/// End of the copy address space: offsets are 32-bit.
const MAX_ADDRESS: u64 = 1 << 32;

/// A registered source and where it starts in the logical address space.
#[derive(Debug, Clone, Copy)]
pub struct SourceText<'a> {
    pub data: &'a [u8],
    pub start: usize,
}

/// Build progress of the fingerprint table.
#[derive(Debug)]
enum IndexState {
    /// No table and nothing waiting to be indexed.
    Empty,
    /// Fulltext sources recorded but not yet fingerprinted.
    Pending(Vec<usize>),
    Built(HashTable),
}

/// Flattened view of the table for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDump {
    /// First slot of every bucket.
    pub hash_list: Vec<usize>,
    /// `(logical_offset, fingerprint)` per slot; free slots are `(0, 0)`.
    pub entry_list: Vec<(usize, u32)>,
}

/// Fingerprint index used to encode targets against borrowed sources.
pub struct DeltaIndex<'a> {
    sources: Vec<SourceText<'a>>,
    state: IndexState,
    source_offset: usize,
    config: IndexConfig,
}

impl Default for DeltaIndex<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeltaIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeltaIndex({}, {})", self.sources.len(), self.source_offset)
    }
}

impl<'a> DeltaIndex<'a> {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            sources: Vec::new(),
            state: IndexState::Empty,
            source_offset: 0,
            config,
        }
    }

    /// An index holding `source` at logical offset `base_offset`.
    pub fn new_with_source(source: &'a [u8], base_offset: usize) -> Result<Self> {
        let mut index = Self::new();
        index.add_source(source, base_offset)?;
        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Next unused logical offset.
    pub fn source_offset(&self) -> usize {
        self.source_offset
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[SourceText<'a>] {
        &self.sources
    }

    pub fn config(&self) -> IndexConfig {
        self.config
    }

    pub fn max_bytes_to_index(&self) -> usize {
        self.config.max_bytes_to_index
    }

    /// Applies to fulltexts indexed from now on.
    pub fn set_max_bytes_to_index(&mut self, max_bytes_to_index: usize) {
        self.config.max_bytes_to_index = max_bytes_to_index;
    }

    /// Whether the fingerprint table exists.
    pub fn has_index(&self) -> bool {
        matches!(self.state, IndexState::Built(_))
    }

    /// Occupied table entries, 0 before the first build.
    pub fn num_entries(&self) -> usize {
        match &self.state {
            IndexState::Built(t) => t.num_entries(),
            _ => 0,
        }
    }

    /// Number of buckets, 0 before the first build.
    pub fn hash_size(&self) -> usize {
        match &self.state {
            IndexState::Built(t) => t.size(),
            _ => 0,
        }
    }

    /// Approximate heap footprint in bytes, source bytes excluded.
    pub fn memory_size(&self) -> usize {
        let table = match &self.state {
            IndexState::Built(t) => t.memory_size(),
            IndexState::Pending(ids) => ids.capacity() * std::mem::size_of::<usize>(),
            IndexState::Empty => 0,
        };
        std::mem::size_of::<Self>() + self.sources.capacity() * std::mem::size_of::<SourceText<'_>>() + table
    }

    /// Snapshot of the table layout, or `None` before it is built.
    pub fn dump_index(&self) -> Option<IndexDump> {
        let IndexState::Built(table) = &self.state else {
            return None;
        };
        let entry_list = table
            .slots()
            .iter()
            .map(|slot| match slot {
                Some(e) => (self.sources[e.source as usize].start + e.offset as usize, e.val),
                None => (0, 0),
            })
            .collect();
        Some(IndexDump {
            hash_list: table.bucket_starts().to_vec(),
            entry_list,
        })
    }

    // -----------------------------------------------------------------------
    // Adding sources
    // -----------------------------------------------------------------------

    /// Register a fulltext source starting at logical offset `base_offset`.
    ///
    /// `base_offset` must not be below `source_offset()`; the bytes between
    /// the previous end and `base_offset` are never referenced.
    pub fn add_source(&mut self, source: &'a [u8], base_offset: usize) -> Result<()> {
        let start = self.placement(source.len(), base_offset)?;
        let id = self.push_source(source, start);
        if matches!(self.state, IndexState::Empty) {
            trace!("deferring index of source {id} ({} bytes)", source.len());
            self.state = IndexState::Pending(vec![id]);
        } else {
            let table = self.take_table();
            self.state = IndexState::Built(self.index_fulltext(id, Some(table)));
        }
        Ok(())
    }

    /// Register a delta as a source. Only the literal bytes of its insert
    /// instructions are fingerprinted.
    ///
    /// Bytes that do not parse as a delta are rejected and not registered.
    pub fn add_delta_source(&mut self, delta: &'a [u8], base_offset: usize) -> Result<()> {
        let start = self.placement(delta.len(), base_offset)?;
        self.ensure_built();
        let entries = delta_entries(self.sources.len() as u32, delta)?;
        let id = self.push_source(delta, start);

        let found = entries.len();
        let table = self.take_table();
        let (table, repacked) = table.extend(entries);
        debug!(
            "indexed delta source {id}: {} bytes, {found} entries, {} buckets{}",
            delta.len(),
            table.size(),
            if repacked { ", repacked" } else { "" }
        );
        self.state = IndexState::Built(table);
        Ok(())
    }

    /// Fold any pending sources into the table.
    pub fn ensure_built(&mut self) {
        if !self.has_index() {
            let table = self.take_table();
            self.state = IndexState::Built(table);
        }
    }

    // -----------------------------------------------------------------------
    // Delta creation
    // -----------------------------------------------------------------------

    /// Encode `target` against every registered source.
    ///
    /// Returns `None` if no source has been added.
    pub fn make_delta(&mut self, target: &[u8]) -> Option<Vec<u8>> {
        self.make_delta_with_limit(target, 0)
    }

    /// Like `make_delta`, but gives up with `None` once the delta would
    /// exceed `max_delta_size` bytes. Zero means no limit.
    pub fn make_delta_with_limit(&mut self, target: &[u8], max_delta_size: usize) -> Option<Vec<u8>> {
        if self.sources.is_empty() {
            return None;
        }
        self.ensure_built();
        let IndexState::Built(table) = &self.state else {
            return None;
        };
        let delta = encoder::create_delta(table, &self.sources, target, max_delta_size);
        match &delta {
            Some(d) => trace!("delta for {} byte target: {} bytes", target.len(), d.len()),
            None => trace!(
                "delta for {} byte target exceeds {max_delta_size} bytes",
                target.len()
            ),
        }
        delta
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Check that a source of `len` bytes fits at `base_offset`.
    fn placement(&self, len: usize, base_offset: usize) -> Result<usize> {
        if base_offset < self.source_offset {
            return Err(DeltaError::OverlappingSource {
                start: base_offset,
                source_offset: self.source_offset,
            });
        }
        let end = base_offset as u64 + len as u64;
        if end > MAX_ADDRESS {
            return Err(DeltaError::OffsetOverflow { offset: end });
        }
        Ok(base_offset)
    }

    fn push_source(&mut self, data: &'a [u8], start: usize) -> usize {
        self.sources.push(SourceText { data, start });
        self.source_offset = start + data.len();
        self.sources.len() - 1
    }

    /// Move the table out of `self.state`, building it first if needed.
    /// Leaves the state `Empty`; the caller stores the result back.
    fn take_table(&mut self) -> HashTable {
        match std::mem::replace(&mut self.state, IndexState::Empty) {
            IndexState::Built(t) => t,
            IndexState::Empty => HashTable::empty(MIN_TABLE_SIZE),
            IndexState::Pending(ids) => ids
                .into_iter()
                .fold(None, |table, id| Some(self.index_fulltext(id, table)))
                .unwrap_or_else(|| HashTable::empty(MIN_TABLE_SIZE)),
        }
    }

    /// Fingerprint fulltext `id` and merge it into `old`.
    fn index_fulltext(&self, id: usize, old: Option<HashTable>) -> HashTable {
        let src = self.sources[id].data;
        if src.is_empty() {
            return old.unwrap_or_else(|| HashTable::empty(MIN_TABLE_SIZE));
        }
        let (n, stride) = self.config.sampling(src.len());

        // Walk backwards so a run of identical windows keeps its lowest offset.
        let mut found: Vec<IndexEntry> = Vec::with_capacity(n);
        let mut prev = None;
        for k in (1..=n).rev() {
            let end = k * stride;
            let entry = IndexEntry {
                source: id as u32,
                offset: end as u32,
                val: rabin_hash(&src[end + 1 - RABIN_WINDOW..=end]),
            };
            if prev == Some(entry.val) {
                if let Some(last) = found.last_mut() {
                    *last = entry;
                }
            } else {
                prev = Some(entry.val);
                found.push(entry);
            }
        }
        found.reverse();

        let total = n + old.as_ref().map_or(0, HashTable::num_entries);
        let hsize = table::table_size(total, old.as_ref());
        let mut buckets = table::bucketize(found.iter().copied(), hsize);
        let culled = buckets.iter_mut().map(table::limit_bucket).filter(|&c| c).count();

        let (table, repacked) = HashTable::merge(old, buckets);
        debug!(
            "indexed source {id}: {} bytes, stride {stride}, {} entries, {} buckets{}{}",
            src.len(),
            found.len(),
            table.size(),
            if repacked { ", repacked" } else { "" },
            if culled > 0 { format!(", {culled} buckets culled") } else { String::new() }
        );
        table
    }
}

/// Fingerprints for the insert literals of `delta`, tagged with `source`.
///
/// Only literal runs long enough to hold a useful match are sampled, every
/// 16 bytes. The whole delta must parse to exactly its end.
fn delta_entries(source: u32, delta: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    if delta.len().saturating_sub(1) / RABIN_WINDOW == 0 {
        return Ok(entries);
    }
    let (_, mut pos) = varint::read_u64(delta)?;
    let top = delta.len();
    let mut prev = None;
    while pos < top {
        let cmd = delta[pos];
        pos += 1;
        if cmd & 0x80 != 0 {
            pos += CopyFlags::from_bits_retain(cmd).payload_len();
        } else if cmd != 0 {
            let mut remaining = cmd as usize;
            if pos + remaining > top {
                break;
            }
            while remaining > RABIN_WINDOW + 3 {
                let val = rabin_hash(&delta[pos + 1..pos + 1 + RABIN_WINDOW]);
                if prev != Some(val) {
                    prev = Some(val);
                    entries.push(IndexEntry {
                        source,
                        offset: (pos + RABIN_WINDOW) as u32,
                        val,
                    });
                }
                remaining -= RABIN_WINDOW;
                pos += RABIN_WINDOW;
            }
            pos += remaining;
        } else {
            break;
        }
    }
    if pos != top {
        return Err(DeltaError::corrupt(format!(
            "delta source does not end on an instruction boundary ({pos} != {top})"
        )));
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
