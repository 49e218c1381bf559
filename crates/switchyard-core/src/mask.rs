//! Mask-bit pool
//!
//! Fixed-size bitmap of the indices handed out to inter-router connections.
//! A set bit is free. Claims always return the lowest free bit, so a
//! released bit is the next one claimed.

use crate::config::MAX_MASK_BITS;
use crate::errors::{RouterError, RouterResult};
use crate::types::MaskBit;

/// Pool of free mask bits
#[derive(Debug, Clone)]
pub struct MaskBitPool {
    words: Vec<u64>,
    capacity: usize,
}

impl MaskBitPool {
    /// Pool with bits `0..capacity` free; capacity is clamped to the global
    /// maximum
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_MASK_BITS);
        let mut words = vec![u64::MAX; capacity.div_ceil(64)];
        let tail = capacity % 64;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        Self { words, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim the lowest free bit, `None` when exhausted
    pub fn claim(&mut self) -> Option<MaskBit> {
        for (idx, word) in self.words.iter_mut().enumerate() {
            if *word != 0 {
                let bit = word.trailing_zeros() as usize;
                *word &= !(1u64 << bit);
                return Some(idx * 64 + bit);
            }
        }
        None
    }

    /// Return a bit to the pool; releasing a free bit is a no-op
    pub fn release(&mut self, bit: MaskBit) -> RouterResult<()> {
        self.check_range(bit)?;
        self.words[bit / 64] |= 1u64 << (bit % 64);
        Ok(())
    }

    pub fn is_free(&self, bit: MaskBit) -> bool {
        bit < self.capacity && self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    pub fn free_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn check_range(&self, bit: MaskBit) -> RouterResult<()> {
        if bit >= self.capacity {
            return Err(RouterError::MaskBitOutOfRange {
                bit,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}
