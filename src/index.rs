//! The multi-bucket Hamming index.
//!
//! # How a search works
//!
//! The key positions are split into `B` contiguous buckets, each owning
//! a one-deletion signature table over its slice of every key. With
//! `B = (r + 3) / 2`, any key within distance `r` of the query agrees
//! with it up to one mismatch in at least one bucket, so probing every
//! bucket table with the query's slices surfaces every true neighbor as
//! a candidate.
//!
//! Per bucket, the number of deletion variants under which a key
//! matches is one of {0, 1, L_b}: a count of 1 witnesses at most one
//! mismatch inside the bucket, while a count of 2 or more forces the
//! slices to be equal. The per-candidate tally of these strong and weak
//! bucket votes feeds an odd/even case analysis on `r` that discards
//! candidates which provably cannot be within distance `r`. Survivors
//! are verified against a bit-plane transposition of the keys: XOR one
//! plane at a time, OR into a running difference word, and stop as soon
//! as its popcount exceeds `r`.
//!
//! # References
//!
//! - Zhang, X., Qin, J., Wang, W., Sun, Y., & Lu, J. (2013). "HmSearch:
//!   an efficient Hamming distance query processing algorithm." SSDBM.
//! - Mor, M., & Fraenkel, A. S. (1982). "A hash code method for
//!   detecting and correcting spelling errors."

use ahash::AHashMap;

use crate::bucket::{proper_buckets, split_points};
use crate::error::{Error, Result};
use crate::intvec::IntVector;
use crate::odv::OdvTable;
use crate::vertical::{plane_count, vertical_code};

const MAGIC: &[u8; 8] = b"HMSEARC1";

/// Candidate verification layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    /// Keys transposed into bit planes; verification is XOR + popcount
    /// per plane with early exit.
    Vertical,
    /// Keys stored verbatim; verification compares symbols directly.
    Plain,
}

enum KeyStore {
    Vertical { planes: IntVector, levels: u32 },
    Plain { keys: IntVector },
}

#[derive(Default)]
struct Votes {
    strong: u16,
    weak: u16,
}

/// An immutable index answering Hamming-radius queries over short
/// fixed-length keys.
pub struct HmIndex {
    tables: Vec<OdvTable>,
    bucket_begs: Vec<u32>,
    length: u32,
    alphabet_size: u32,
    buckets: u32,
    store: KeyStore,
}

impl std::fmt::Debug for HmIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmIndex")
            .field("length", &self.length)
            .field("alphabet_size", &self.alphabet_size)
            .field("buckets", &self.buckets)
            .field("keys", &self.num_keys())
            .field("mode", &self.verify_mode())
            .finish()
    }
}

impl HmIndex {
    /// Build an index with the bit-plane key store.
    ///
    /// `keys` is a flat buffer of `length`-symbol records; symbols must
    /// be in `[0, alphabet_size)`. `buckets` is normally
    /// [`proper_buckets`] of the radius the index will serve.
    pub fn build(keys: &[u32], length: u32, alphabet_size: u32, buckets: u32) -> Result<Self> {
        Self::build_with_mode(keys, length, alphabet_size, buckets, VerifyMode::Vertical)
    }

    /// Build an index with an explicit verification layout.
    pub fn build_with_mode(
        keys: &[u32],
        length: u32,
        alphabet_size: u32,
        buckets: u32,
        mode: VerifyMode,
    ) -> Result<Self> {
        if length == 0 || length > 64 {
            return Err(Error::UnsupportedLength(length));
        }
        if alphabet_size < 2 || alphabet_size == u32::MAX {
            return Err(Error::AlphabetSize(alphabet_size));
        }
        if keys.len() % length as usize != 0 {
            return Err(Error::InvalidInput(format!(
                "key buffer of {} symbols is not a multiple of length {}",
                keys.len(),
                length
            )));
        }
        let num_keys = keys.len() / length as usize;
        if num_keys > u32::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "{num_keys} keys exceed the u32 id range"
            )));
        }
        if buckets == 0 || buckets > length {
            return Err(Error::InvalidInput(format!(
                "bucket count {buckets} out of range for length {length}"
            )));
        }

        let bucket_begs = split_points(length, buckets);

        let mut tables = Vec::with_capacity(buckets as usize);
        let mut slices: Vec<&[u32]> = Vec::with_capacity(num_keys);
        for b in 0..buckets as usize {
            let beg = bucket_begs[b] as usize;
            let end = bucket_begs[b + 1] as usize;
            slices.clear();
            slices.extend(keys.chunks_exact(length as usize).map(|k| &k[beg..end]));
            tables.push(OdvTable::build(&slices, (end - beg) as u32, alphabet_size)?);
        }

        let store = match mode {
            VerifyMode::Vertical => {
                let levels = plane_count(alphabet_size);
                let mut planes = IntVector::new(num_keys * levels as usize, length);
                for (i, key) in keys.chunks_exact(length as usize).enumerate() {
                    let beg = i * levels as usize;
                    for j in 0..levels {
                        planes.set(beg + j as usize, vertical_code(key, j));
                    }
                }
                KeyStore::Vertical { planes, levels }
            }
            VerifyMode::Plain => {
                let mut packed =
                    IntVector::new(keys.len(), IntVector::width_for(alphabet_size));
                for (i, &s) in keys.iter().enumerate() {
                    packed.set(i, u64::from(s));
                }
                KeyStore::Plain { keys: packed }
            }
        };

        Ok(Self {
            tables,
            bucket_begs,
            length,
            alphabet_size,
            buckets,
            store,
        })
    }

    /// Emit every key id within Hamming distance `range` of `query`
    /// through `sink`, returning the number of candidates that reached
    /// verification.
    ///
    /// `query.len()` must equal the key length. The emission order is
    /// unspecified; callers needing sorted output sort after collection.
    pub fn search(&self, query: &[u32], range: u32, sink: impl FnMut(u32)) -> Result<u64> {
        let proper = proper_buckets(range);
        if self.buckets != proper {
            return Err(Error::RadiusMismatch {
                range,
                buckets: self.buckets,
                proper,
            });
        }
        self.search_impl(query, range, true, sink)
    }

    fn search_impl(
        &self,
        query: &[u32],
        range: u32,
        use_filter: bool,
        mut sink: impl FnMut(u32),
    ) -> Result<u64> {
        assert_eq!(query.len(), self.length as usize);

        let mut sig: Vec<u32> = Vec::new();
        let mut match_map: AHashMap<u32, u32> = AHashMap::new();
        let mut cand_map: AHashMap<u32, Votes> = AHashMap::new();

        for b in 0..self.buckets as usize {
            let beg = self.bucket_begs[b] as usize;
            let end = self.bucket_begs[b + 1] as usize;
            let slice = &query[beg..end];

            match_map.clear();
            self.tables[b].probe(slice, &mut sig, |id| {
                *match_map.entry(id).or_insert(0) += 1;
            })?;

            // A count of 2+ forces slice equality; a width-1 bucket can
            // never witness two deletions, so any match there counts as
            // strong rather than risking a dropped neighbor.
            let strong_at = if end - beg == 1 { 1 } else { 2 };
            for (&id, &count) in &match_map {
                let votes = cand_map.entry(id).or_default();
                if count >= strong_at {
                    votes.strong += 1;
                } else {
                    votes.weak += 1;
                }
            }
        }

        let vertical_query: Vec<u64> = match &self.store {
            KeyStore::Vertical { levels, .. } => {
                (0..*levels).map(|j| vertical_code(query, j)).collect()
            }
            KeyStore::Plain { .. } => Vec::new(),
        };

        let mut verified = 0u64;
        for (&id, votes) in &cand_map {
            if use_filter && self.filtered(votes, range) {
                continue;
            }
            verified += 1;
            if self.within_range(id, query, &vertical_query, range) {
                sink(id);
            }
        }
        Ok(verified)
    }

    /// Enhanced filter: drop candidates whose bucket votes cannot reach
    /// total distance `range`. Even radii admit at most one non-exact
    /// bucket; odd radii admit two.
    fn filtered(&self, votes: &Votes, range: u32) -> bool {
        let matched = votes.strong + votes.weak;
        if range % 2 == 0 {
            matched == 1 && votes.weak == 1
        } else {
            matched == 1 || (matched == 2 && votes.weak == 2)
        }
    }

    fn within_range(&self, id: u32, query: &[u32], vertical_query: &[u64], range: u32) -> bool {
        match &self.store {
            KeyStore::Vertical { planes, levels } => {
                let beg = id as usize * *levels as usize;
                let mut cumdiff = 0u64;
                for (j, &vq) in vertical_query.iter().enumerate() {
                    cumdiff |= planes.get(beg + j) ^ vq;
                    if cumdiff.count_ones() > range {
                        return false;
                    }
                }
                true
            }
            KeyStore::Plain { keys } => {
                let beg = id as usize * self.length as usize;
                let mut dist = 0u32;
                for (p, &q) in query.iter().enumerate() {
                    if keys.get(beg + p) != u64::from(q) {
                        dist += 1;
                        if dist > range {
                            return false;
                        }
                    }
                }
                true
            }
        }
    }

    /// Key length in symbols.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Alphabet size the index was built with.
    #[must_use]
    pub fn alphabet_size(&self) -> u32 {
        self.alphabet_size
    }

    /// Number of position buckets.
    #[must_use]
    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn num_keys(&self) -> usize {
        match &self.store {
            KeyStore::Vertical { planes, levels } => planes.len() / *levels as usize,
            KeyStore::Plain { keys } => keys.len() / self.length as usize,
        }
    }

    /// Verification layout of this index.
    #[must_use]
    pub fn verify_mode(&self) -> VerifyMode {
        match self.store {
            KeyStore::Vertical { .. } => VerifyMode::Vertical,
            KeyStore::Plain { .. } => VerifyMode::Plain,
        }
    }

    /// Approximate heap memory usage of all owned storage, in bytes.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        let store = match &self.store {
            KeyStore::Vertical { planes, .. } => planes.heap_bytes(),
            KeyStore::Plain { keys } => keys.heap_bytes(),
        };
        self.tables.iter().map(OdvTable::heap_bytes).sum::<usize>()
            + self.bucket_begs.capacity() * 4
            + store
    }

    /// Serialize to a stable little-endian encoding.
    ///
    /// Format: magic (`HMSEARC1`), `length: u32`, `alphabet_size: u32`,
    /// `buckets: u32`, mode tag `u8`, the `buckets + 1` begin offsets,
    /// one length-prefixed [`OdvTable`] per bucket, then the key store
    /// (plane levels + length-prefixed planes in vertical mode, a
    /// length-prefixed symbol vector in plain mode).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.alphabet_size.to_le_bytes());
        out.extend_from_slice(&self.buckets.to_le_bytes());
        out.push(match self.store {
            KeyStore::Vertical { .. } => 0,
            KeyStore::Plain { .. } => 1,
        });
        for &beg in &self.bucket_begs {
            out.extend_from_slice(&beg.to_le_bytes());
        }
        for table in &self.tables {
            let bytes = table.to_bytes();
            out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        match &self.store {
            KeyStore::Vertical { planes, levels } => {
                out.extend_from_slice(&levels.to_le_bytes());
                let bytes = planes.to_bytes();
                out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
            KeyStore::Plain { keys } => {
                let bytes = keys.to_bytes();
                out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
        }
        out
    }

    /// Deserialize from `to_bytes()` output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut off = 0usize;
        let mut take = |n: usize| -> Result<&[u8]> {
            if n > bytes.len() - off {
                return Err(Error::InvalidEncoding(
                    "HmIndex encoding truncated".to_string(),
                ));
            }
            let slice = &bytes[off..off + n];
            off += n;
            Ok(slice)
        };

        if take(8)? != MAGIC {
            return Err(Error::InvalidEncoding("bad magic for HmIndex".to_string()));
        }
        let length = u32::from_le_bytes(take(4)?.try_into().unwrap());
        let alphabet_size = u32::from_le_bytes(take(4)?.try_into().unwrap());
        let buckets = u32::from_le_bytes(take(4)?.try_into().unwrap());
        let mode_tag = take(1)?[0];

        if length == 0 || length > 64 {
            return Err(Error::InvalidEncoding(format!(
                "HmIndex length {length} out of range"
            )));
        }
        if alphabet_size < 2 || alphabet_size == u32::MAX {
            return Err(Error::InvalidEncoding(format!(
                "HmIndex alphabet size {alphabet_size} out of range"
            )));
        }
        if buckets == 0 || buckets > length {
            return Err(Error::InvalidEncoding(format!(
                "HmIndex bucket count {buckets} out of range"
            )));
        }

        let mut bucket_begs = Vec::with_capacity(buckets as usize + 1);
        for _ in 0..=buckets {
            bucket_begs.push(u32::from_le_bytes(take(4)?.try_into().unwrap()));
        }
        if bucket_begs != split_points(length, buckets) {
            return Err(Error::InvalidEncoding(
                "HmIndex bucket offsets do not partition the length".to_string(),
            ));
        }

        let mut tables = Vec::with_capacity(buckets as usize);
        for b in 0..buckets as usize {
            let len = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
            let table = OdvTable::from_bytes(take(len)?)?;
            let width = bucket_begs[b + 1] - bucket_begs[b];
            if table.length() != width || table.del_marker() != alphabet_size {
                return Err(Error::InvalidEncoding(format!(
                    "bucket {b} table does not match the index header"
                )));
            }
            tables.push(table);
        }

        let store = if mode_tag == 0 {
            let levels = u32::from_le_bytes(take(4)?.try_into().unwrap());
            if levels != plane_count(alphabet_size) {
                return Err(Error::InvalidEncoding(format!(
                    "HmIndex plane count {levels} does not match the alphabet"
                )));
            }
            let len = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
            let planes = IntVector::from_bytes(take(len)?)?;
            if planes.width() != length || planes.len() % levels as usize != 0 {
                return Err(Error::InvalidEncoding(
                    "HmIndex plane store has the wrong shape".to_string(),
                ));
            }
            KeyStore::Vertical { planes, levels }
        } else if mode_tag == 1 {
            let len = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
            let keys = IntVector::from_bytes(take(len)?)?;
            if keys.width() != IntVector::width_for(alphabet_size)
                || keys.len() % length as usize != 0
            {
                return Err(Error::InvalidEncoding(
                    "HmIndex key store has the wrong shape".to_string(),
                ));
            }
            KeyStore::Plain { keys }
        } else {
            return Err(Error::InvalidEncoding(format!(
                "unknown verification mode tag {mode_tag}"
            )));
        };

        if off != bytes.len() {
            return Err(Error::InvalidEncoding(
                "trailing bytes after HmIndex".to_string(),
            ));
        }

        let index = Self {
            tables,
            bucket_begs,
            length,
            alphabet_size,
            buckets,
            store,
        };
        let n = index.num_keys();
        for (b, table) in index.tables.iter().enumerate() {
            let width = index.bucket_begs[b + 1] - index.bucket_begs[b];
            if table.num_entries() != n * width as usize {
                return Err(Error::InvalidEncoding(format!(
                    "bucket {b} table entry count does not match {n} keys"
                )));
            }
            if table.max_id().is_some_and(|id| id as usize >= n) {
                return Err(Error::InvalidEncoding(format!(
                    "bucket {b} table references ids beyond the {n} stored keys"
                )));
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::LinearScan;

    fn collect(index: &HmIndex, query: &[u32], range: u32) -> Vec<u32> {
        let mut hits = Vec::new();
        index.search(query, range, |id| hits.push(id)).unwrap();
        hits.sort_unstable();
        hits
    }

    const SMALL_KEYS: [u32; 16] = [0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1];

    #[test]
    fn test_radius_one_binary_keys() {
        let index = HmIndex::build(&SMALL_KEYS, 4, 2, proper_buckets(1)).unwrap();
        assert_eq!(collect(&index, &[0, 0, 0, 0], 1), vec![0, 2]);
    }

    #[test]
    fn test_radius_two_binary_keys() {
        let index = HmIndex::build(&SMALL_KEYS, 4, 2, proper_buckets(2)).unwrap();
        assert_eq!(collect(&index, &[0, 0, 0, 0], 2), vec![0, 2]);
    }

    #[test]
    fn test_exact_match_only() {
        let keys = [0, 1, 2, 3, 0, 1, 2, 3, 3, 2, 1, 0, 3, 2, 1, 0];
        let index = HmIndex::build(&keys, 8, 4, proper_buckets(0)).unwrap();
        assert_eq!(collect(&index, &keys[0..8], 0), vec![0]);
        assert_eq!(collect(&index, &keys[8..16], 0), vec![1]);
    }

    #[test]
    fn test_radius_three_byte_alphabet() {
        let keys = [0u32; 8];
        let index = HmIndex::build(&keys, 8, 256, proper_buckets(3)).unwrap();
        assert_eq!(collect(&index, &[1, 1, 1, 0, 0, 0, 0, 0], 3), vec![0]);
        assert_eq!(
            collect(&index, &[1, 1, 1, 1, 0, 0, 0, 0], 3),
            Vec::<u32>::new()
        );
    }

    #[test]
    fn test_modes_agree() {
        let keys: Vec<u32> = (0..96).map(|i| (i * 7) % 5).collect();
        let q: Vec<u32> = (0..12).map(|i| (i * 3) % 5).collect();
        for range in [1u32, 2, 3] {
            let b = proper_buckets(range);
            let vert = HmIndex::build_with_mode(&keys, 12, 5, b, VerifyMode::Vertical).unwrap();
            let plain = HmIndex::build_with_mode(&keys, 12, 5, b, VerifyMode::Plain).unwrap();
            assert_eq!(collect(&vert, &q, range), collect(&plain, &q, range));
        }
    }

    #[test]
    fn test_filter_only_prunes() {
        let keys: Vec<u32> = (0..120).map(|i| (i * 13) % 3).collect();
        let scan = LinearScan::new(&keys, 8).unwrap();
        for range in [1u32, 2, 3, 4] {
            let index = HmIndex::build(&keys, 8, 3, proper_buckets(range)).unwrap();
            for qi in 0..15 {
                let q = &keys[qi * 8..(qi + 1) * 8];

                let mut on = Vec::new();
                let count_on = index.search_impl(q, range, true, |id| on.push(id)).unwrap();
                let mut off = Vec::new();
                let count_off = index
                    .search_impl(q, range, false, |id| off.push(id))
                    .unwrap();
                on.sort_unstable();
                off.sort_unstable();

                // the filter changes the candidate count, never the answer
                assert_eq!(on, off);
                assert!(count_on <= count_off);

                let mut truth = Vec::new();
                scan.search(q, range, |id| truth.push(id));
                assert_eq!(on, truth);
            }
        }
    }

    #[test]
    fn test_candidate_count_deterministic() {
        let keys: Vec<u32> = (0..64).map(|i| i % 2).collect();
        let index = HmIndex::build(&keys, 8, 2, proper_buckets(2)).unwrap();
        let q = [0u32, 1, 0, 1, 0, 1, 0, 1];
        let c1 = index.search(&q, 2, |_| {}).unwrap();
        let c2 = index.search(&q, 2, |_| {}).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_empty_index() {
        let index = HmIndex::build(&[], 8, 4, 2).unwrap();
        assert_eq!(index.num_keys(), 0);
        assert_eq!(collect(&index, &[0, 1, 2, 3, 0, 1, 2, 3], 2), Vec::<u32>::new());
    }

    #[test]
    fn test_build_rejects_bad_parameters() {
        assert!(matches!(
            HmIndex::build(&[0; 65], 65, 2, 2),
            Err(Error::UnsupportedLength(65))
        ));
        assert!(matches!(
            HmIndex::build(&[0; 8], 8, 1, 2),
            Err(Error::AlphabetSize(1))
        ));
        assert!(matches!(
            HmIndex::build(&[0; 8], 8, u32::MAX, 2),
            Err(Error::AlphabetSize(_))
        ));
        assert!(matches!(
            HmIndex::build(&[0, 0, 7, 0, 0, 0, 0, 0], 8, 4, 2),
            Err(Error::SymbolOutOfRange { symbol: 7, .. })
        ));
        assert!(HmIndex::build(&[0; 7], 8, 4, 2).is_err());
        assert!(HmIndex::build(&[0; 8], 8, 4, 9).is_err());
    }

    #[test]
    fn test_radius_mismatch() {
        let index = HmIndex::build(&SMALL_KEYS, 4, 2, 2).unwrap();
        let err = index.search(&[0, 0, 0, 0], 4, |_| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::RadiusMismatch {
                range: 4,
                buckets: 2,
                proper: 3,
            }
        ));
    }

    #[test]
    fn test_roundtrip_both_modes() {
        let keys: Vec<u32> = (0..60).map(|i| (i * 11) % 4).collect();
        for mode in [VerifyMode::Vertical, VerifyMode::Plain] {
            let index = HmIndex::build_with_mode(&keys, 6, 4, 2, mode).unwrap();
            let bytes = index.to_bytes();
            let loaded = HmIndex::from_bytes(&bytes).unwrap();
            assert_eq!(bytes, loaded.to_bytes());
            assert_eq!(loaded.verify_mode(), mode);
            assert_eq!(loaded.num_keys(), 10);
            let q = &keys[12..18];
            assert_eq!(collect(&index, q, 2), collect(&loaded, q, 2));
        }
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(HmIndex::from_bytes(b"").is_err());
        assert!(HmIndex::from_bytes(b"HMSEARC1").is_err());
        assert!(HmIndex::from_bytes(&[0u8; 64]).is_err());

        let index = HmIndex::build(&SMALL_KEYS, 4, 2, 2).unwrap();
        let mut bytes = index.to_bytes();
        bytes.push(0);
        assert!(HmIndex::from_bytes(&bytes).is_err());
    }
}
