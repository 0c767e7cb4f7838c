// Fingerprinting and the bucket table behind `DeltaIndex`.
//
// - 16-byte Rabin fingerprints with O(1) rolling
// - Bucket-sorted entry table with per-bucket slack
// - Sampling configuration and engine constants

pub mod config;
pub mod rabin;
pub mod table;
