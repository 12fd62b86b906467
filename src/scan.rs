//! Exhaustive radius scan: the correctness and performance baseline.

use crate::error::{Error, Result};

/// A flat copy of the keys, searched by direct symbol comparison.
///
/// Serves as the ground-truth oracle for [`crate::HmIndex`] and as the
/// baseline every filtering structure has to beat.
#[derive(Clone, Default)]
pub struct LinearScan {
    keys: Vec<u32>,
    length: u32,
}

impl LinearScan {
    /// Copy `keys` (a flat buffer of `length`-symbol records).
    pub fn new(keys: &[u32], length: u32) -> Result<Self> {
        if length == 0 || keys.len() % length as usize != 0 {
            return Err(Error::InvalidInput(format!(
                "key buffer of {} symbols is not a multiple of length {}",
                keys.len(),
                length
            )));
        }
        Ok(Self {
            keys: keys.to_vec(),
            length,
        })
    }

    /// Number of keys stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len() / self.length as usize
    }

    /// Return true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Emit the id of every key within Hamming distance `range` of `query`.
    pub fn search(&self, query: &[u32], range: u32, mut sink: impl FnMut(u32)) {
        assert_eq!(query.len(), self.length as usize);
        for (i, key) in self.keys.chunks_exact(self.length as usize).enumerate() {
            let mut dist = 0u32;
            for (x, y) in key.iter().zip(query) {
                if x != y {
                    dist += 1;
                    if dist > range {
                        break;
                    }
                }
            }
            if dist <= range {
                sink(i as u32);
            }
        }
    }

    /// Approximate heap memory usage in bytes.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.keys.capacity() * 4
    }
}
