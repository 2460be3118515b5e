//! Partition selection for outbound records
//!
//! Keyed records hash with murmur2 (the same function Kafka's default
//! partitioner uses), so a key maps to the same partition in every process.
//! Unkeyed records rotate round-robin.

use std::sync::atomic::{AtomicU32, Ordering};

/// murmur2 hash, 32-bit, seed `0x9747b28c`
pub fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let length = data.len();
    let mut h = SEED ^ length as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() == 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Partition for a key: positive murmur2 modulo partition count
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    debug_assert!(partitions > 0);
    (murmur2(key.as_bytes()) & 0x7fff_ffff) % partitions
}

/// Round-robin cursor for unkeyed records
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicU32,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next partition in rotation
    pub fn next_partition(&self, partitions: u32) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed) % partitions
    }
}

/// Choose the partition for a record
pub fn select_partition(key: Option<&str>, partitions: u32, round_robin: &RoundRobin) -> u32 {
    match key {
        Some(key) => partition_for_key(key, partitions),
        None => round_robin.next_partition(partitions),
    }
}
