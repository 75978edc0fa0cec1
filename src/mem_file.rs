// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::byte_range::ByteRange;
use crate::storage::{AllocationInfo, RangeBatch, SparseStorage};
use core::fmt::{self, Display, Formatter};
use std::io;

/// Error type used by [`MemFile`], wrapped in an [`io::Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemIoError {
    /// A range does not fit in the file.
    OutOfBounds {
        /// Start of the range.
        start: u64,
        /// Length of the range.
        len: u64,
        /// Length of the file.
        file_len: usize,
    },

    /// A range was deallocated before sparse mode was enabled.
    NotSparse,
}

impl Display for MemIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                start,
                len,
                file_len,
            } => write!(
                f,
                "range of {len} bytes at offset {start} is outside a file of length {file_len}"
            ),
            Self::NotSparse => write!(f, "file is not in sparse mode"),
        }
    }
}

impl std::error::Error for MemIoError {}

impl From<MemIoError> for io::Error {
    fn from(err: MemIoError) -> Self {
        let kind = match err {
            MemIoError::OutOfBounds { .. } => io::ErrorKind::InvalidInput,
            MemIoError::NotSparse => io::ErrorKind::Unsupported,
        };
        io::Error::new(kind, err)
    }
}

/// In-memory sparse file.
///
/// Holds the file data along with the set of ranges that are backed by
/// storage. Bytes outside the allocated ranges always read as zero.
/// Every successful [`SparseStorage::deallocate`] call is recorded and
/// available through [`MemFile::deallocations`].
#[derive(Clone, Debug, Default)]
pub struct MemFile {
    data: Vec<u8>,
    allocated: Vec<ByteRange>,
    deallocations: Vec<ByteRange>,
    sparse: bool,
}

impl MemFile {
    /// Create a file with every byte of `data` allocated.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        let file_range = Self::range_of(&data);
        let allocated = if file_range.is_empty() {
            Vec::new()
        } else {
            vec![file_range]
        };
        Self {
            data,
            allocated,
            deallocations: Vec::new(),
            sparse: false,
        }
    }

    /// Create a file where only `allocated` is backed by storage. Bytes
    /// of `data` outside `allocated` are zeroed.
    ///
    /// `allocated` is sorted and merged, and clipped to the length of
    /// `data`.
    pub fn with_allocated(
        mut data: Vec<u8>,
        allocated: &[ByteRange],
    ) -> Result<Self, MemIoError> {
        let file_range = Self::range_of(&data);
        let mut ranges: Vec<ByteRange> = allocated
            .iter()
            .filter_map(|r| r.intersect(&file_range))
            .collect();
        ranges.sort_by_key(ByteRange::start);

        let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
        for r in ranges {
            match merged.last_mut() {
                Some(last) if r.start() <= last.end() => {
                    *last = ByteRange::new(last.start(), last.end().max(r.end()))
                        .unwrap_or(*last);
                }
                _ => merged.push(r),
            }
        }

        // Zero out the holes, including the one after the last range.
        let mut pos = 0;
        for r in &merged {
            Self::zero(&mut data, pos, r.start())?;
            pos = r.end();
        }
        Self::zero(&mut data, pos, file_range.end())?;

        Ok(Self {
            data,
            allocated: merged,
            deallocations: Vec::new(),
            sparse: false,
        })
    }

    /// Get the file contents, including holes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the ranges currently backed by storage.
    #[must_use]
    pub fn allocated(&self) -> &[ByteRange] {
        &self.allocated
    }

    /// Get every range passed to a successful deallocation request, in
    /// request order.
    #[must_use]
    pub fn deallocations(&self) -> &[ByteRange] {
        &self.deallocations
    }

    /// Whether sparse mode has been enabled.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    fn range_of(data: &[u8]) -> ByteRange {
        let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
        ByteRange::from_start_len(0, len).unwrap_or(ByteRange::EMPTY)
    }

    fn zero(data: &mut [u8], start: u64, end: u64) -> Result<(), MemIoError> {
        if let Some(range) = ByteRange::new(start, end) {
            Self::slice_mut(data, range)?.fill(0);
        }
        Ok(())
    }

    fn slice_mut(
        data: &mut [u8],
        range: ByteRange,
    ) -> Result<&mut [u8], MemIoError> {
        let file_len = data.len();
        let err = MemIoError::OutOfBounds {
            start: range.start(),
            len: range.len(),
            file_len,
        };
        let start = usize::try_from(range.start()).map_err(|_| err)?;
        let end = usize::try_from(range.end()).map_err(|_| err)?;
        data.get_mut(start..end).ok_or(err)
    }
}

impl SparseStorage for MemFile {
    fn file_size(&mut self) -> io::Result<u64> {
        Ok(Self::range_of(&self.data).end())
    }

    fn enable_sparse(&mut self) -> io::Result<()> {
        self.sparse = true;
        Ok(())
    }

    fn query_allocated_ranges(
        &mut self,
        region: ByteRange,
        max_ranges: usize,
    ) -> io::Result<RangeBatch> {
        let mut batch = RangeBatch::default();
        for r in self.allocated.iter().filter_map(|r| r.intersect(&region)) {
            if batch.ranges.len() >= max_ranges {
                batch.more_data = true;
                break;
            }
            batch.ranges.push(r);
        }
        Ok(batch)
    }

    fn read_bytes(&mut self, offset: u64, dst: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(src) = self.data.get(start..) else {
            return Ok(0);
        };
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }

    fn deallocate(&mut self, range: ByteRange) -> io::Result<()> {
        if !self.sparse {
            return Err(MemIoError::NotSparse.into());
        }
        Self::slice_mut(&mut self.data, range)?.fill(0);

        // Cut `range` out of the allocated ranges.
        let mut remaining = Vec::with_capacity(self.allocated.len() + 1);
        for r in &self.allocated {
            if r.intersect(&range).is_none() {
                remaining.push(*r);
                continue;
            }
            if r.start() < range.start() {
                remaining.extend(ByteRange::new(r.start(), range.start()));
            }
            if range.end() < r.end() {
                remaining.extend(ByteRange::new(range.end(), r.end()));
            }
        }
        self.allocated = remaining;

        self.deallocations.push(range);
        Ok(())
    }

    fn allocation_info(&mut self) -> io::Result<AllocationInfo> {
        Ok(AllocationInfo {
            logical_size: Self::range_of(&self.data).end(),
            allocated_size: self.allocated.iter().map(ByteRange::len).sum(),
        })
    }
}
