//! Vertical bit-plane codec for short keys.
//!
//! A key of length `L <= 64` over symbols of `b` significant bits is
//! sliced into `b` planes: plane `j` is the `L`-bit word whose bit `p`
//! is bit `j` of symbol `p`. Two keys differ at position `p` exactly
//! when at least one plane differs at bit `p`, so the Hamming distance
//! of two keys is the popcount of the OR of their per-plane XORs. The
//! search path exploits this by accumulating XORs plane by plane and
//! bailing out as soon as the popcount exceeds the radius.

/// Extract bit-plane `level` of `key` as an `L`-bit word.
///
/// Bit `p` of the result is bit `level` of `key[p]`. `key.len()` must
/// be at most 64.
#[inline]
#[must_use]
pub fn vertical_code(key: &[u32], level: u32) -> u64 {
    debug_assert!(key.len() <= 64);
    let mut code = 0u64;
    for (p, &sym) in key.iter().enumerate() {
        let bit = u64::from((sym >> level) & 1);
        code |= bit << p;
    }
    code
}

/// Number of planes needed for symbols in `[0, alphabet_size]`.
///
/// The deletion marker equals `alphabet_size`, so the plane count is
/// the bit length of `alphabet_size` itself.
#[must_use]
pub fn plane_count(alphabet_size: u32) -> u32 {
    crate::intvec::IntVector::width_for(alphabet_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol_from_planes(planes: &[u64], pos: usize) -> u32 {
        let mut sym = 0u32;
        for (j, &plane) in planes.iter().enumerate() {
            sym |= (((plane >> pos) & 1) as u32) << j;
        }
        sym
    }

    #[test]
    fn test_plane_bits_match_symbol_bits() {
        let key = [0u32, 255, 1, 128, 77, 200];
        for level in 0..9 {
            let code = vertical_code(&key, level);
            for (p, &sym) in key.iter().enumerate() {
                assert_eq!((code >> p) & 1, u64::from((sym >> level) & 1));
            }
        }
    }

    #[test]
    fn test_planes_reconstruct_key() {
        let key = [3u32, 0, 7, 5, 2, 6, 1, 4];
        let levels = plane_count(8);
        let planes: Vec<u64> = (0..levels).map(|j| vertical_code(&key, j)).collect();
        for (p, &sym) in key.iter().enumerate() {
            assert_eq!(symbol_from_planes(&planes, p), sym);
        }
    }

    #[test]
    fn test_plane_count() {
        assert_eq!(plane_count(2), 2);
        assert_eq!(plane_count(4), 3);
        assert_eq!(plane_count(256), 9);
    }

    #[test]
    fn test_high_positions_zero() {
        let key = [1u32, 1];
        assert_eq!(vertical_code(&key, 0), 0b11);
        assert_eq!(vertical_code(&key, 1), 0);
    }
}
