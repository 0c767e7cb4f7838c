// Index tuning: fixed engine constants plus the per-index sampling budget.

/// Width of the fingerprint window in bytes.
pub const RABIN_WINDOW: usize = 16;

/// Maximum entries kept per bucket when new content is folded in.
pub const HASH_LIMIT: usize = 64;

/// Empty slots reserved at the end of every bucket for later additions.
pub const EXTRA_NULLS: usize = 4;

/// Shortest match worth a copy instruction.
pub const MIN_MATCH: usize = 4;

/// Match length at which the encoder stops probing for a better candidate.
pub const GOOD_ENOUGH_MATCH: usize = 4096;

/// Smallest bucket count of a hash table.
pub const MIN_TABLE_SIZE: usize = 16;

/// Configuration for a `DeltaIndex`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexConfig {
    /// Upper bound on source bytes sampled per fulltext source. Zero keeps
    /// one fingerprint per 16 bytes regardless of size.
    pub max_bytes_to_index: usize,
}

impl IndexConfig {
    pub fn with_max_bytes_to_index(max_bytes_to_index: usize) -> Self {
        Self { max_bytes_to_index }
    }

    /// Sampling geometry for a fulltext of `len` bytes: `(entries, stride)`.
    ///
    /// Entry `k` (1-based) covers the window ending at byte `k * stride`.
    pub fn sampling(&self, len: usize) -> (usize, usize) {
        if len == 0 {
            return (0, RABIN_WINDOW);
        }
        let mut entries = (len - 1) / RABIN_WINDOW;
        let mut stride = RABIN_WINDOW;
        if self.max_bytes_to_index > 0 {
            let budget = self.max_bytes_to_index / RABIN_WINDOW;
            if entries > budget {
                entries = budget;
                if entries > 0 {
                    stride = (len - 1) / entries;
                }
            }
        }
        (entries, stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_sampling_uses_window_stride() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.sampling(0), (0, 16));
        assert_eq!(cfg.sampling(16), (0, 16));
        assert_eq!(cfg.sampling(17), (1, 16));
        assert_eq!(cfg.sampling(77), (4, 16));
        assert_eq!(cfg.sampling(1 << 20), (65535, 16));
    }

    #[test]
    fn budget_widens_stride() {
        let cfg = IndexConfig::with_max_bytes_to_index(48);
        assert_eq!(cfg.sampling(77), (3, 25));
        assert_eq!(cfg.sampling(40), (2, 16));

        let cfg = IndexConfig::with_max_bytes_to_index(1600);
        let (entries, stride) = cfg.sampling(200_000);
        assert_eq!(entries, 100);
        assert_eq!(stride, 1999);
        assert!(entries * stride < 200_000);
    }

    #[test]
    fn budget_below_one_window_samples_nothing() {
        let cfg = IndexConfig::with_max_bytes_to_index(8);
        assert_eq!(cfg.sampling(1000), (0, 16));
    }
}
