// Bucket-sorted fingerprint table.
//
// All entries of bucket `b` live in `slots[bounds[b]..bounds[b + 1]]`,
// occupied slots first, followed by free slack. The table never changes
// size in place: growing it means packing a new table from a borrowed
// snapshot of the old one plus the incoming entries.

use super::config::{EXTRA_NULLS, HASH_LIMIT, MIN_TABLE_SIZE};

/// One sampled window: which source it came from, where the window ends
/// inside that source, and its fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub source: u32,
    pub offset: u32,
    pub val: u32,
}

/// Fingerprint table with per-bucket slack.
#[derive(Debug, Clone)]
pub struct HashTable {
    mask: usize,
    bounds: Vec<usize>,
    slots: Vec<Option<IndexEntry>>,
    entries: usize,
}

/// Bucket count for `total` entries: a power of two of at least
/// `total / 4`, never below 16 and never smaller than `old`.
pub fn table_size(total: usize, old: Option<&HashTable>) -> usize {
    let wanted = total / 4;
    let mut bits = MIN_TABLE_SIZE.trailing_zeros();
    while (1usize << bits) < wanted && bits < 31 {
        bits += 1;
    }
    let size = 1usize << bits;
    match old {
        Some(t) if t.size() > size => t.size(),
        _ => size,
    }
}

/// Distribute `entries` into `hsize` buckets, preserving their order.
pub fn bucketize(entries: impl IntoIterator<Item = IndexEntry>, hsize: usize) -> Vec<Vec<IndexEntry>> {
    let mask = hsize - 1;
    let mut buckets = vec![Vec::new(); hsize];
    for e in entries {
        buckets[e.val as usize & mask].push(e);
    }
    buckets
}

/// Thin `bucket` uniformly down to `HASH_LIMIT` entries.
///
/// Returns true if anything was dropped.
pub fn limit_bucket(bucket: &mut Vec<IndexEntry>) -> bool {
    let len = bucket.len();
    if len <= HASH_LIMIT {
        return false;
    }
    let excess = (len - HASH_LIMIT) as isize;
    let limit = HASH_LIMIT as isize;
    let mut kept = Vec::with_capacity(HASH_LIMIT);
    let mut acc: isize = 0;
    let mut i = 0;
    while i < len {
        kept.push(bucket[i]);
        acc += excess;
        if acc > 0 {
            loop {
                i += 1;
                acc -= limit;
                if acc <= 0 {
                    break;
                }
            }
        }
        i += 1;
    }
    *bucket = kept;
    true
}

impl HashTable {
    /// A table with `hsize` empty buckets.
    pub fn empty(hsize: usize) -> Self {
        Self::pack(vec![Vec::new(); hsize], None)
    }

    /// Lay out a fresh table from per-bucket lists of new entries.
    ///
    /// Bucket `i` receives, in order: the entries of `old` that hash to it,
    /// then `new[i]`, then `EXTRA_NULLS` free slots.
    pub fn pack(new: Vec<Vec<IndexEntry>>, old: Option<&HashTable>) -> Self {
        let hsize = new.len();
        debug_assert!(hsize.is_power_of_two());
        let mask = hsize - 1;
        let old_entries = old.map_or(0, |t| t.entries);
        let new_entries: usize = new.iter().map(Vec::len).sum();

        let mut bounds = Vec::with_capacity(hsize + 1);
        let mut slots = Vec::with_capacity(old_entries + new_entries + hsize * EXTRA_NULLS);
        for (i, fresh) in new.into_iter().enumerate() {
            bounds.push(slots.len());
            if let Some(old) = old {
                slots.extend(
                    old.bucket(i & old.mask)
                        .filter(|e| e.val as usize & mask == i)
                        .copied()
                        .map(Some),
                );
            }
            slots.extend(fresh.into_iter().map(Some));
            slots.extend(std::iter::repeat_n(None, EXTRA_NULLS));
        }
        bounds.push(slots.len());

        Self {
            mask,
            bounds,
            slots,
            entries: old_entries + new_entries,
        }
    }

    /// Fold bucketized entries into `old`, reusing its slack when the size
    /// is unchanged and every entry fits; otherwise pack a new table.
    ///
    /// Returns the table and whether it was repacked.
    pub fn merge(old: Option<HashTable>, mut new: Vec<Vec<IndexEntry>>) -> (Self, bool) {
        let Some(mut old) = old else {
            return (Self::pack(new, None), true);
        };
        if old.size() == new.len() {
            let mut fit = true;
            for (i, bucket) in new.iter_mut().enumerate() {
                let placed = bucket.iter().take_while(|e| old.try_fill(i, **e)).count();
                bucket.drain(..placed);
                if !bucket.is_empty() {
                    fit = false;
                    break;
                }
            }
            if fit {
                return (old, false);
            }
        }
        (Self::pack(new, Some(&old)), true)
    }

    /// Add entries one by one into existing slack; the first entry that does
    /// not fit sends it and all later ones into a repacked table.
    ///
    /// Returns the table and whether it was repacked.
    pub fn extend(mut self, entries: Vec<IndexEntry>) -> (Self, bool) {
        let placed = entries
            .iter()
            .take_while(|e| {
                let b = e.val as usize & self.mask;
                self.try_fill(b, **e)
            })
            .count();
        if placed == entries.len() {
            return (self, false);
        }
        let rest = &entries[placed..];
        let hsize = table_size(rest.len() + self.entries, Some(&self));
        let buckets = bucketize(rest.iter().copied(), hsize);
        (Self::pack(buckets, Some(&self)), true)
    }

    /// Put `e` in the first free slot of bucket `b`.
    pub fn try_fill(&mut self, b: usize, e: IndexEntry) -> bool {
        let range = self.bounds[b]..self.bounds[b + 1];
        match self.slots[range].iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(e);
                self.entries += 1;
                true
            }
            None => false,
        }
    }

    /// Occupied entries of bucket `b`, in insertion order.
    #[inline]
    pub fn bucket(&self, b: usize) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.slots[self.bounds[b]..self.bounds[b + 1]]
            .iter()
            .map_while(Option::as_ref)
    }

    /// Candidates whose fingerprint equals `val`.
    #[inline]
    pub fn lookup(&self, val: u32) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.bucket(val as usize & self.mask)
            .filter(move |e| e.val == val)
    }

    /// Number of buckets.
    #[inline]
    pub fn size(&self) -> usize {
        self.bounds.len() - 1
    }

    #[inline]
    pub fn mask(&self) -> usize {
        self.mask
    }

    /// Occupied slots.
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.entries
    }

    /// Occupied plus free slots.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Start slot of every bucket.
    pub fn bucket_starts(&self) -> &[usize] {
        &self.bounds[..self.size()]
    }

    pub fn slots(&self) -> &[Option<IndexEntry>] {
        &self.slots
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_size(&self) -> usize {
        self.bounds.capacity() * std::mem::size_of::<usize>()
            + self.slots.capacity() * std::mem::size_of::<Option<IndexEntry>>()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
