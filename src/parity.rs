//! XOR parity over fixed-size blocks.
//!
//! Parity is addition in GF(2): a parity block is the XOR of every data block
//! in its redundancy group, so replacing one member only needs the current
//! value of every other member plus the new value.

use crate::device::{Block, BLOCK_SIZE};
use crate::error::{Error, Result};

pub fn zeros() -> Box<Block> {
    Box::new([0u8; BLOCK_SIZE])
}

pub fn from_fn<F>(mut cb: F) -> Box<Block>
where
    F: FnMut(usize) -> u8,
{
    let mut block = zeros();
    for (i, byte) in block.iter_mut().enumerate() {
        *byte = cb(i);
    }
    block
}

/// Views `data` as a block, rejecting anything that is not exactly
/// `BLOCK_SIZE` bytes long.
pub fn as_block(data: &[u8]) -> Result<&Block> {
    data.try_into().map_err(|_| Error::SizeMismatch {
        expected: BLOCK_SIZE,
        actual: data.len(),
    })
}

pub fn xor_into(acc: &mut Block, other: &Block) {
    for (a, b) in acc.iter_mut().zip(other.iter()) {
        *a ^= *b;
    }
}

/// Running XOR of the blocks absorbed so far.
pub struct Accumulator {
    parity: Box<Block>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self { parity: zeros() }
    }

    pub fn absorb(&mut self, block: &Block) {
        xor_into(&mut self.parity, block)
    }

    pub fn finish(self) -> Box<Block> {
        self.parity
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}
