//! Fixed-capacity read flags packed eight to a byte.
//!
//! Buffer layout: ⌈capacity/8⌉ bytes, least-significant bit first inside
//! each byte, so flag `k` lives at byte `k/8`, bit position `k%8`. Packing
//! keeps the encoded form an eighth of a flag-per-byte layout, which is what
//! lets the whole state fit under the sync store's per-item quota.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::consts::{BIT_OFF, BIT_ON, BYTE_BITS};
use crate::errors::{ReadmarkError, Result};

pub struct BitSet {
    buffer: Vec<u8>,
    capacity: usize,
}

impl BitSet {
    /// New set of `capacity` flags, all zero.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; the capacity is fixed for the life of
    /// the set, so an empty one could never hold anything.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            buffer: vec![0u8; capacity.div_ceil(BYTE_BITS)],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.capacity {
            return Err(ReadmarkError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Flag at `index`, as `0` or `1`.
    pub fn get(&self, index: usize) -> Result<u8> {
        self.check_index(index)?;
        Ok((self.buffer[index / BYTE_BITS] >> (index % BYTE_BITS)) & BIT_ON)
    }

    /// Sets the flag at `index` to `value`, which must be exactly `0` or
    /// `1`. No other flag is touched.
    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        self.check_index(index)?;
        let mask = BIT_ON << (index % BYTE_BITS);
        match value {
            BIT_ON => self.buffer[index / BYTE_BITS] |= mask,
            BIT_OFF => self.buffer[index / BYTE_BITS] &= !mask,
            other => return Err(ReadmarkError::InvalidBit(other)),
        }
        Ok(())
    }

    /// Standard base64 over the raw buffer. The store only takes text.
    pub fn encode(&self) -> String {
        BASE64.encode(&self.buffer)
    }

    /// Full overwrite from an encoded buffer, not a merge. A payload shorter
    /// than the buffer zeroes the remainder; a longer one is rejected. On
    /// any error the buffer is left exactly as it was.
    pub fn decode(&mut self, text: &str) -> Result<()> {
        let bytes = BASE64.decode(text)?;
        if bytes.len() > self.buffer.len() {
            return Err(ReadmarkError::DecodeOverflow {
                got: bytes.len(),
                max: self.buffer.len(),
            });
        }
        self.buffer.fill(0);
        self.buffer[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Indices in `0..capacity`, ascending, whose flag satisfies `pred`.
    pub fn select_indices<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(u8, usize) -> bool,
    {
        let mut out = Vec::new();
        for index in 0..self.capacity {
            let bit = (self.buffer[index / BYTE_BITS] >> (index % BYTE_BITS)) & BIT_ON;
            if pred(bit, index) {
                out.push(index);
            }
        }
        out
    }
}
