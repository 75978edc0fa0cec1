// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::byte_range::ByteRange;
use crate::error::ResparseError;
use crate::storage::SparseStorage;
use log::debug;
use std::collections::VecDeque;
use std::io;

/// Maximum number of ranges requested from the storage per query.
const QUERY_BATCH_SIZE: usize = 64;

/// Snapshot of the ranges of a file that are backed by storage.
///
/// Ranges are sorted by start and do not overlap. The list is consumed
/// from the front as a scan moves through the file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AllocatedRanges {
    ranges: VecDeque<ByteRange>,
}

impl AllocatedRanges {
    /// Query `storage` for every allocated range in the first
    /// `file_size` bytes.
    ///
    /// The storage may answer in several batches; querying continues
    /// from the end of the last range of each batch until the storage
    /// reports no more data or the end of the file is reached.
    pub fn query<S: SparseStorage + ?Sized>(
        storage: &mut S,
        file_size: u64,
    ) -> Result<Self, ResparseError> {
        let mut ranges = VecDeque::new();
        let mut pos = 0;

        while pos < file_size {
            let batch_start = pos;
            let region = ByteRange::new(pos, file_size)
                .ok_or_else(|| no_progress(pos))?;
            let batch = storage
                .query_allocated_ranges(region, QUERY_BATCH_SIZE)
                .map_err(ResparseError::RangeQuery)?;

            for range in &batch.ranges {
                debug!("Found allocated range {range}");
                // Ranges must move forward, otherwise querying from the
                // end of the batch would loop forever.
                if range.start() < pos || range.end() > file_size {
                    return Err(ResparseError::RangeQuery(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "allocated range {range} is outside of [{pos}...{file_size})"
                        ),
                    )));
                }
                pos = range.end();
            }
            // A batch of empty ranges would repeat the same query.
            if batch.more_data && pos == batch_start {
                return Err(no_progress(pos));
            }
            ranges.extend(batch.ranges.into_iter().filter(|r| !r.is_empty()));

            if !batch.more_data {
                break;
            }
        }

        Ok(Self { ranges })
    }

    /// Create the list from ranges that are already sorted and
    /// non-overlapping.
    pub(crate) fn from_sorted(ranges: impl IntoIterator<Item = ByteRange>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
        }
    }

    /// Get the first remaining range.
    #[must_use]
    pub fn front(&self) -> Option<&ByteRange> {
        self.ranges.front()
    }

    /// Drop the first remaining range and get the one after it.
    pub fn advance(&mut self) -> Option<&ByteRange> {
        self.ranges.pop_front();
        self.ranges.front()
    }

    /// Number of remaining ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of bytes in the remaining ranges.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(ByteRange::len).sum()
    }

    /// Iterate over the remaining ranges.
    pub fn iter(&self) -> impl Iterator<Item = &ByteRange> {
        self.ranges.iter()
    }
}

fn no_progress(pos: u64) -> ResparseError {
    ResparseError::RangeQuery(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("allocated range query made no progress at offset {pos}"),
    ))
}
