//! Approximate-Membership Filter
//!
//! A Bloom-style probabilistic set membership structure used by
//! [`crate::sstable`] to avoid touching the data region of a sorted
//! table for keys that are provably absent.
//!
//! # Design
//!
//! A single 64-bit base hash (FNV-1a-64) is computed per key; the `i`-th
//! of `k` bit positions is derived from the base hash by a fixed linear
//! probe (`base + i * 0x9E3779B9`), avoiding `k` independent hash
//! functions. This is the classic "double hashing" Bloom filter
//! construction (Kirsch & Mitzenmacher).
//!
//! # Guarantees
//!
//! - **No false negatives.** If `add(key)` was ever called, `contains(key)`
//!   always returns `true`.
//! - **False positives possible**, bounded by the chosen bit count `m`
//!   and hash count `k` for a given key-set size `n`.
//!
//! # On-disk format
//!
//! `[m: u64 LE][k: u64 LE][bitset: ceil(m/8) bytes]`


use std::io;

/// Number of hash probes per key. Fixed by the on-disk format — changing
/// this value changes the false-positive rate but not the wire format,
/// since `k` is itself serialized.
pub const HASH_COUNT: u64 = 7;

/// Bits allocated per expected key (`m = BITS_PER_KEY * n`).
pub const BITS_PER_KEY: u64 = 10;

/// Minimum bit-count floor, so that filters for tiny (or empty) key sets
/// still have a usable bitset.
pub const MIN_BITS: u64 = 64;

/// The multiplicative step between successive hash probes.
const PROBE_STEP: u64 = 0x9E3779B9;

/// An approximate-membership filter over a fixed key set.
///
/// Built once via [`Filter::for_key_count`] + repeated [`Filter::add`],
/// then serialized into a sorted table via [`Filter::encode`]. Never
/// mutated after a table is written; [`Filter::decode`] reconstructs an
/// equivalent filter from bytes read back off disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    bits: Vec<u8>,
    m: u64,
    k: u64,
}

impl Filter {
    /// Sizes a new, empty filter for a key set of size `n`, following
    /// `m = BITS_PER_KEY * n` clamped to a minimum of [`MIN_BITS`] bits,
    /// and `k = HASH_COUNT`.
    pub fn for_key_count(n: usize) -> Self {
        Self::for_key_count_with(n, BITS_PER_KEY, HASH_COUNT)
    }

    /// As [`Filter::for_key_count`], but with `bits_per_key`/`hash_count`
    /// overriding the module defaults. Used by
    /// [`crate::engine::EngineConfig`] to let callers tune the
    /// false-positive rate (smaller filters for tests, larger ones for
    /// production key sets).
    pub fn for_key_count_with(n: usize, bits_per_key: u64, hash_count: u64) -> Self {
        let m = (bits_per_key * n as u64).max(MIN_BITS);
        let byte_len = m.div_ceil(8) as usize;
        Self {
            bits: vec![0u8; byte_len],
            m,
            k: hash_count,
        }
    }

    /// Sets the `k` bit positions derived from `key`.
    pub fn add(&mut self, key: &[u8]) {
        let base = fnv1a64(key);
        for i in 0..self.k {
            let pos = self.position(base, i);
            self.set_bit(pos);
        }
    }

    /// Returns `true` if `key` is *possibly* present. Never returns
    /// `false` for a key that was previously [`Filter::add`]ed.
    pub fn contains(&self, key: &[u8]) -> bool {
        let base = fnv1a64(key);
        for i in 0..self.k {
            let pos = self.position(base, i);
            if !self.bit(pos) {
                return false;
            }
        }
        true
    }

    fn position(&self, base: u64, i: u64) -> u64 {
        base.wrapping_add(i.wrapping_mul(PROBE_STEP)) % self.m
    }

    fn set_bit(&mut self, pos: u64) {
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        self.bits[byte] |= 1 << bit;
    }

    fn bit(&self, pos: u64) -> bool {
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        (self.bits[byte] & (1 << bit)) != 0
    }

    /// Serializes this filter as `[m: u64 LE][k: u64 LE][bitset bytes]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.bits.len());
        out.extend_from_slice(&self.m.to_le_bytes());
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.bits);
        out
    }

    /// Parses a filter previously produced by [`Filter::encode`].
    ///
    /// Returns an I/O error (kind [`io::ErrorKind::InvalidData`]) if the
    /// buffer is shorter than the header or shorter than the bitset the
    /// header claims to carry.
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < 16 {
            return Err(invalid("filter header truncated"));
        }
        let m = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let k = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let expected_bytes = m.div_ceil(8) as usize;
        let bits = &buf[16..];
        if bits.len() != expected_bytes {
            return Err(invalid("filter bitset length mismatch"));
        }
        Ok(Self {
            bits: bits.to_vec(),
            m,
            k,
        })
    }

    /// Total encoded length in bytes, as it will appear on disk.
    pub fn encoded_len(&self) -> usize {
        16 + self.bits.len()
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// FNV-1a-64 over arbitrary bytes. Deterministic across platforms and
/// process runs — required since the filter's bit positions are derived
/// directly from this value.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
