// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::block_size::BlockSize;
use crate::byte_range::ByteRange;
use crate::error::ResparseError;
use crate::storage::SparseStorage;

/// One block read by [`ZeroDetector::read_block`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Block {
    /// Bytes covered by the read.
    pub(crate) range: ByteRange,

    /// Whether every byte in `range` is zero.
    pub(crate) is_zero: bool,
}

/// Reads a file one block at a time and checks each block for zeroes.
pub(crate) struct ZeroDetector {
    buf: Vec<u8>,
}

impl ZeroDetector {
    pub(crate) fn new(block_size: BlockSize) -> Self {
        Self {
            buf: vec![0; block_size.to_usize()],
        }
    }

    /// Read the block starting at `pos`.
    ///
    /// The read is clamped to `allocated`, the allocated range
    /// containing `pos`, so a block never reaches into a hole. The
    /// returned block may be shorter than the block size; the caller
    /// advances by `block.range.len()`.
    pub(crate) fn read_block<S: SparseStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        pos: u64,
        allocated: &ByteRange,
    ) -> Result<Block, ResparseError> {
        let remaining = allocated.end().saturating_sub(pos);
        let len = usize::try_from(remaining)
            .map_or(self.buf.len(), |remaining| remaining.min(self.buf.len()));
        let dst = &mut self.buf[..len];

        let bytes_read = storage
            .read_bytes(pos, dst)
            .map_err(|err| ResparseError::Read { offset: pos, err })?;
        if bytes_read == 0 {
            return Err(ResparseError::UnexpectedEof { offset: pos });
        }
        let read = &dst[..bytes_read.min(len)];

        // OK to unwrap: `read.len()` is at most the block size, which
        // fits in a `u64`.
        let read_len = u64::try_from(read.len()).unwrap();
        let range = ByteRange::from_start_len(pos, read_len)
            .ok_or(ResparseError::UnexpectedEof { offset: pos })?;

        Ok(Block {
            range,
            is_zero: is_all_zero(read),
        })
    }
}

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}
