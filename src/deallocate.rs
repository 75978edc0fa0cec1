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

/// Sends deallocation requests to the storage and counts the bytes
/// released.
#[derive(Debug, Default)]
pub(crate) struct Deallocator {
    dry_run: bool,
    deallocated_bytes: u64,
    requests: u64,
}

impl Deallocator {
    /// Create a deallocator. If `dry_run` is true, ranges are counted
    /// but the storage is never modified.
    pub(crate) fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Release the storage behind `range`, which must be all zero.
    pub(crate) fn deallocate<S: SparseStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        range: ByteRange,
    ) -> Result<(), ResparseError> {
        if self.dry_run {
            debug!("Would deallocate bytes {range}");
        } else {
            debug!("Deallocating bytes {range}");
            storage
                .deallocate(range)
                .map_err(|err| ResparseError::Deallocation { range, err })?;
        }

        self.deallocated_bytes =
            self.deallocated_bytes.saturating_add(range.len());
        self.requests += 1;
        Ok(())
    }

    /// Total bytes in every successful request.
    pub(crate) fn deallocated_bytes(&self) -> u64 {
        self.deallocated_bytes
    }

    /// Number of successful requests.
    pub(crate) fn requests(&self) -> u64 {
        self.requests
    }
}
