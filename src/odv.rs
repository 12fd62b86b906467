//! One-deletion-variant signature table.
//!
//! For a slice `s` of length `L_b`, the signature `sig(s, i)` is `s`
//! with position `i` replaced by a reserved deletion marker (the
//! alphabet size). Two slices share a signature exactly when they agree
//! everywhere except possibly at the deleted position, so probing all
//! `L_b` deletion variants of a query slice finds every stored slice
//! within Hamming distance one.
//!
//! The table is open-addressed with linear probing at load factor 1.5.
//! Each occupied slot references a signature in a shared bit-packed
//! store and a half-open range of a shared id array. A slot whose
//! `sig_pos` equals `u32::MAX` is vacant and terminates a probe.

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::intvec::IntVector;

const VACANT: u32 = u32::MAX;
const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 2;

/// 64-bit FNV-1a over the signature symbols, each taken as a 32-bit word.
#[inline]
fn fnv1a(symbols: &[u32]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &s in symbols {
        hash ^= u64::from(s);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[derive(Clone, Copy)]
struct Slot {
    sig_pos: u32,
    id_beg: u32,
    id_end: u32,
}

/// Hash table from one-deletion signatures to key id lists.
pub struct OdvTable {
    slots: Vec<Slot>,
    ids: Vec<u32>,
    signatures: IntVector,
    length: u32,
    del_marker: u32,
}

impl std::fmt::Debug for OdvTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdvTable")
            .field("length", &self.length)
            .field("slots", &self.slots.len())
            .field("signatures", &self.num_signatures())
            .finish()
    }
}

impl OdvTable {
    /// Build a table over `slices`, each of length `length`, with symbols
    /// drawn from `[0, alphabet_size)`. Key ids are slice positions.
    pub fn build(slices: &[&[u32]], length: u32, alphabet_size: u32) -> Result<Self> {
        let del_marker = alphabet_size;
        let len = length as usize;

        // Group ids by signature. The buffer is refilled per key and the
        // deleted position restored after each variant.
        let mut groups: AHashMap<Vec<u32>, Vec<u32>> = AHashMap::new();
        let mut sig = vec![0u32; len];
        for (i, slice) in slices.iter().enumerate() {
            debug_assert_eq!(slice.len(), len);
            sig.copy_from_slice(slice);
            for j in 0..len {
                if slice[j] >= alphabet_size {
                    return Err(Error::SymbolOutOfRange {
                        symbol: slice[j],
                        alphabet_size,
                    });
                }
                sig[j] = del_marker;
                if let Some(ids) = groups.get_mut(sig.as_slice()) {
                    ids.push(i as u32);
                } else {
                    groups.insert(sig.clone(), vec![i as u32]);
                }
                sig[j] = slice[j];
            }
        }

        let distinct = groups.len();
        if distinct > VACANT as usize || slices.len().saturating_mul(len) > VACANT as usize {
            return Err(Error::InvalidInput(format!(
                "{} slices of width {len} overflow the u32 offset range",
                slices.len()
            )));
        }
        let table_size = (distinct * LOAD_NUM).div_ceil(LOAD_DEN);

        let mut slots = vec![
            Slot {
                sig_pos: VACANT,
                id_beg: 0,
                id_end: 0,
            };
            table_size
        ];
        let mut signatures = IntVector::new(distinct * len, IntVector::width_for(alphabet_size));
        let mut ids = Vec::with_capacity(slices.len() * len);

        let mut next_sig = 0usize;
        for (sig, group) in &groups {
            let mut pos = (fnv1a(sig) % table_size as u64) as usize;
            while slots[pos].sig_pos != VACANT {
                pos += 1;
                if pos == table_size {
                    pos = 0;
                }
            }
            slots[pos].sig_pos = next_sig as u32;
            for (j, &s) in sig.iter().enumerate() {
                signatures.set(next_sig * len + j, u64::from(s));
            }
            next_sig += 1;

            slots[pos].id_beg = ids.len() as u32;
            ids.extend_from_slice(group);
            slots[pos].id_end = ids.len() as u32;
        }
        debug_assert_eq!(next_sig * len, signatures.len());

        Ok(Self {
            slots,
            ids,
            signatures,
            length,
            del_marker,
        })
    }

    /// Probe every one-deletion variant of `slice`, invoking `sink` with
    /// each id stored under a matching signature. An id is reported once
    /// per matching deleted position. `sig` is caller-owned scratch.
    pub fn probe(
        &self,
        slice: &[u32],
        sig: &mut Vec<u32>,
        mut sink: impl FnMut(u32),
    ) -> Result<()> {
        if self.slots.is_empty() {
            return Ok(());
        }
        let len = self.length as usize;
        debug_assert_eq!(slice.len(), len);
        let table_size = self.slots.len();

        sig.clear();
        sig.extend_from_slice(slice);

        for j in 0..len {
            sig[j] = self.del_marker;

            let mut pos = (fnv1a(sig) % table_size as u64) as usize;
            let mut visited = 0usize;
            loop {
                let slot = self.slots[pos];
                if slot.sig_pos == VACANT {
                    break;
                }
                if self.signatures.slice_eq(slot.sig_pos as usize * len, sig) {
                    for &id in &self.ids[slot.id_beg as usize..slot.id_end as usize] {
                        sink(id);
                    }
                    break;
                }
                pos += 1;
                if pos == table_size {
                    pos = 0;
                }
                visited += 1;
                if visited == table_size {
                    return Err(Error::TableCorrupt);
                }
            }

            sig[j] = slice[j];
        }
        Ok(())
    }

    /// Slice width this table was built for.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Deletion marker, equal to the alphabet size.
    #[must_use]
    pub fn del_marker(&self) -> u32 {
        self.del_marker
    }

    /// Number of distinct signatures stored.
    #[must_use]
    pub fn num_signatures(&self) -> usize {
        if self.length == 0 {
            return 0;
        }
        self.signatures.len() / self.length as usize
    }

    /// Total number of (id, deleted position) entries.
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.ids.len()
    }

    /// Largest id stored, if any.
    #[must_use]
    pub fn max_id(&self) -> Option<u32> {
        self.ids.iter().copied().max()
    }

    /// Approximate heap memory usage in bytes.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot>()
            + self.ids.capacity() * 4
            + self.signatures.heap_bytes()
    }

    /// Serialize to a stable little-endian encoding.
    ///
    /// Format: `length: u32`, `del_marker: u32`, `slot count: u64`,
    /// slots as `(sig_pos, id_beg, id_end)` u32 triples, `id count: u64`,
    /// ids as u32, then the length-prefixed signature store.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.del_marker.to_le_bytes());
        out.extend_from_slice(&(self.slots.len() as u64).to_le_bytes());
        for slot in &self.slots {
            out.extend_from_slice(&slot.sig_pos.to_le_bytes());
            out.extend_from_slice(&slot.id_beg.to_le_bytes());
            out.extend_from_slice(&slot.id_end.to_le_bytes());
        }
        out.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());
        for &id in &self.ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        let sig_bytes = self.signatures.to_bytes();
        out.extend_from_slice(&(sig_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&sig_bytes);
        out
    }

    /// Deserialize from `to_bytes()` output. The slice must contain the
    /// encoding exactly, with no trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut off = 0usize;
        let mut take = |n: usize| -> Result<&[u8]> {
            if n > bytes.len() - off {
                return Err(Error::InvalidEncoding(
                    "OdvTable encoding truncated".to_string(),
                ));
            }
            let slice = &bytes[off..off + n];
            off += n;
            Ok(slice)
        };

        let length = u32::from_le_bytes(take(4)?.try_into().unwrap());
        let del_marker = u32::from_le_bytes(take(4)?.try_into().unwrap());

        let slot_count = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
        if slot_count.saturating_mul(12) > bytes.len() {
            return Err(Error::InvalidEncoding(format!(
                "OdvTable slot count ({slot_count}) too large for input ({} bytes)",
                bytes.len()
            )));
        }
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let sig_pos = u32::from_le_bytes(take(4)?.try_into().unwrap());
            let id_beg = u32::from_le_bytes(take(4)?.try_into().unwrap());
            let id_end = u32::from_le_bytes(take(4)?.try_into().unwrap());
            slots.push(Slot {
                sig_pos,
                id_beg,
                id_end,
            });
        }

        let id_count = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
        if id_count.saturating_mul(4) > bytes.len() {
            return Err(Error::InvalidEncoding(format!(
                "OdvTable id count ({id_count}) too large for input ({} bytes)",
                bytes.len()
            )));
        }
        let mut ids = Vec::with_capacity(id_count);
        for _ in 0..id_count {
            ids.push(u32::from_le_bytes(take(4)?.try_into().unwrap()));
        }

        let sig_len = u64::from_le_bytes(take(8)?.try_into().unwrap()) as usize;
        let signatures = IntVector::from_bytes(take(sig_len)?)?;

        if off != bytes.len() {
            return Err(Error::InvalidEncoding(
                "trailing bytes after OdvTable".to_string(),
            ));
        }

        if length == 0 {
            if !signatures.is_empty() || slots.iter().any(|s| s.sig_pos != VACANT) {
                return Err(Error::InvalidEncoding(
                    "OdvTable with zero length is not empty".to_string(),
                ));
            }
        } else {
            if signatures.len() % length as usize != 0 {
                return Err(Error::InvalidEncoding(
                    "OdvTable signature store length mismatch".to_string(),
                ));
            }
            let distinct = (signatures.len() / length as usize) as u64;
            for slot in &slots {
                if slot.sig_pos == VACANT {
                    continue;
                }
                if u64::from(slot.sig_pos) >= distinct
                    || slot.id_beg > slot.id_end
                    || slot.id_end as usize > ids.len()
                {
                    return Err(Error::InvalidEncoding(
                        "OdvTable slot references out-of-range data".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            slots,
            ids,
            signatures,
            length,
            del_marker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(table: &OdvTable, slice: &[u32]) -> Vec<u32> {
        let mut sig = Vec::new();
        let mut hits = Vec::new();
        table.probe(slice, &mut sig, |id| hits.push(id)).unwrap();
        hits.sort_unstable();
        hits
    }

    #[test]
    fn test_build_entry_count() {
        let keys: Vec<&[u32]> = vec![&[0, 1, 2], &[0, 1, 3], &[3, 2, 1]];
        let table = OdvTable::build(&keys, 3, 4).unwrap();
        // every (key, deleted position) pair appears exactly once
        assert_eq!(table.num_entries(), 3 * 3);
        assert!(table.num_signatures() <= 9);
    }

    #[test]
    fn test_probe_within_one_mismatch() {
        let keys: Vec<&[u32]> = vec![&[0, 1, 2], &[0, 1, 3], &[3, 2, 1]];
        let table = OdvTable::build(&keys, 3, 4).unwrap();

        // exact match with key 0: matched once per deleted position
        assert_eq!(collect(&table, &[0, 1, 2]), vec![0, 0, 0, 1]);
        // one mismatch against keys 0 and 1 (at the deleted position)
        assert_eq!(collect(&table, &[0, 1, 0]), vec![0, 1]);
        // two mismatches against everything
        assert_eq!(collect(&table, &[1, 0, 2]), Vec::<u32>::new());
    }

    #[test]
    fn test_duplicate_slices_share_signature() {
        let keys: Vec<&[u32]> = vec![&[5, 5], &[5, 5], &[5, 6]];
        let table = OdvTable::build(&keys, 2, 7).unwrap();
        assert_eq!(collect(&table, &[5, 5]), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_rejects_out_of_alphabet_symbol() {
        let keys: Vec<&[u32]> = vec![&[0, 4]];
        let err = OdvTable::build(&keys, 2, 4).unwrap_err();
        assert!(matches!(err, Error::SymbolOutOfRange { symbol: 4, .. }));
    }

    #[test]
    fn test_empty_table() {
        let keys: Vec<&[u32]> = vec![];
        let table = OdvTable::build(&keys, 3, 4).unwrap();
        assert_eq!(collect(&table, &[0, 1, 2]), Vec::<u32>::new());
    }

    #[test]
    fn test_roundtrip() {
        let keys: Vec<&[u32]> = vec![&[0, 1, 2, 3], &[3, 2, 1, 0], &[0, 1, 2, 0]];
        let table = OdvTable::build(&keys, 4, 4).unwrap();
        let bytes = table.to_bytes();
        let table2 = OdvTable::from_bytes(&bytes).unwrap();
        assert_eq!(bytes, table2.to_bytes());
        assert_eq!(collect(&table, &[0, 1, 2, 3]), collect(&table2, &[0, 1, 2, 3]));
        assert_eq!(collect(&table, &[3, 2, 1, 1]), collect(&table2, &[3, 2, 1, 1]));
    }

    #[test]
    fn test_full_table_probe_is_corrupt() {
        // A table whose every slot is occupied can never terminate a miss.
        let keys: Vec<&[u32]> = vec![&[0, 0]];
        let table = OdvTable::build(&keys, 2, 2).unwrap();
        let mut bytes = table.to_bytes();

        // slots live after length + del_marker + count: 3 u32 triples
        let slot_base = 4 + 4 + 8;
        let slot_count = table.slots.len();
        let occupied: Vec<u8> = table
            .slots
            .iter()
            .find(|s| s.sig_pos != VACANT)
            .map(|s| {
                let mut b = Vec::new();
                b.extend_from_slice(&s.sig_pos.to_le_bytes());
                b.extend_from_slice(&s.id_beg.to_le_bytes());
                b.extend_from_slice(&s.id_end.to_le_bytes());
                b
            })
            .unwrap();
        for k in 0..slot_count {
            bytes[slot_base + 12 * k..slot_base + 12 * (k + 1)].copy_from_slice(&occupied);
        }

        let full = OdvTable::from_bytes(&bytes).unwrap();
        let mut sig = Vec::new();
        // [1, 1] matches no signature of [0, 0], so the probe must give up
        let err = full.probe(&[1, 1], &mut sig, |_| {}).unwrap_err();
        assert!(matches!(err, Error::TableCorrupt));
    }
}
