// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::allocated::AllocatedRanges;
use crate::block_size::BlockSize;
use crate::coalesce::DeallocationQueue;
use crate::deallocate::Deallocator;
use crate::detect::ZeroDetector;
use crate::error::ResparseError;
use crate::storage::{AllocationInfo, SparseStorage};
use core::fmt::{self, Display, Formatter};
use log::info;

#[cfg(target_os = "linux")]
use {
    std::fs::{File, OpenOptions},
    std::path::Path,
};

/// Settings for a single [`Resparser::run`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// Size of the blocks the file is checked in. Only whole blocks of
    /// zeroes (or the zero tail of an allocated range) are
    /// deallocated.
    pub block_size: BlockSize,

    /// Find zero ranges without deallocating them.
    pub dry_run: bool,
}

/// Result of a successful [`Resparser::run`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Summary {
    /// Length of the file in bytes.
    pub file_size: u64,

    /// Bytes the filesystem had allocated before the run.
    pub allocated_before: u64,

    /// Bytes in all deallocation requests made by this run.
    pub zeroed_bytes: u64,

    /// Number of deallocation requests made by this run.
    pub deallocation_requests: u64,

    /// Sizes reported by the filesystem after the run.
    ///
    /// The deallocated byte count here covers holes that existed before
    /// the run, and is affected by the filesystem's allocation unit, so
    /// it generally differs from `zeroed_bytes`.
    pub allocation: AllocationInfo,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done! {} bytes zeroed. Total deallocated bytes reported by OS: {}",
            self.zeroed_bytes,
            self.allocation.deallocated_bytes()
        )
    }
}

/// Converts the zero ranges of a file into holes.
///
/// Owns the storage for its whole lifetime; dropping the `Resparser`
/// closes the file.
#[derive(Debug)]
pub struct Resparser<S> {
    storage: S,
    file_size: u64,
}

#[cfg(target_os = "linux")]
impl Resparser<File> {
    /// Open the file at `path` for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ResparseError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(ResparseError::FileOpen)?;
        Self::new(file)
    }
}

impl<S: SparseStorage> Resparser<S> {
    /// Wrap `storage`, reading its size.
    pub fn new(mut storage: S) -> Result<Self, ResparseError> {
        let file_size =
            storage.file_size().map_err(ResparseError::SizeQuery)?;
        Ok(Self { storage, file_size })
    }

    /// Length of the file, as read when the `Resparser` was created.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get a reference to the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Get the underlying storage back.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Scan the file and deallocate every run of zero blocks.
    ///
    /// Only allocated ranges are read. Each range is read in blocks of
    /// `options.block_size` bytes (the last block of a range may be
    /// shorter); adjacent zero blocks are merged into a single
    /// deallocation request.
    ///
    /// The first error aborts the run. Ranges deallocated before the
    /// error stay deallocated.
    pub fn run(&mut self, options: &Options) -> Result<Summary, ResparseError> {
        info!("Set sparse mode");
        self.storage
            .enable_sparse()
            .map_err(ResparseError::SparseEnable)?;

        let mut allocated =
            AllocatedRanges::query(&mut self.storage, self.file_size)?;
        let allocated_before = allocated.total_bytes();
        info!("File size: {}", self.file_size);
        info!("Allocated: {allocated_before}");

        let mut detector = ZeroDetector::new(options.block_size);
        let mut queue = DeallocationQueue::new();
        let mut deallocator = Deallocator::new(options.dry_run);

        let mut pos = 0;
        let mut current = allocated.front().copied();
        while let Some(range) = current {
            if pos >= range.end() {
                current = allocated.advance().copied();
                continue;
            }
            // Skip the hole before the range.
            pos = pos.max(range.start());

            let block = detector.read_block(&mut self.storage, pos, &range)?;
            if block.is_zero {
                if let Some(done) = queue.push(block.range) {
                    deallocator.deallocate(&mut self.storage, done)?;
                }
            }
            pos = block.range.end();
        }

        if let Some(done) = queue.flush() {
            deallocator.deallocate(&mut self.storage, done)?;
        }

        let allocation = self
            .storage
            .allocation_info()
            .map_err(ResparseError::FinalInfoQuery)?;

        let summary = Summary {
            file_size: self.file_size,
            allocated_before,
            zeroed_bytes: deallocator.deallocated_bytes(),
            deallocation_requests: deallocator.requests(),
            allocation,
        };
        info!(
            "Deallocated {} bytes in {} requests",
            summary.zeroed_bytes, summary.deallocation_requests
        );
        Ok(summary)
    }
}

/// Open the file at `path` and deallocate its zero ranges.
///
/// The file is closed before this returns, whether or not the run
/// succeeds.
#[cfg(target_os = "linux")]
pub fn resparse_path<P: AsRef<Path>>(
    path: P,
    options: &Options,
) -> Result<Summary, ResparseError> {
    let mut resparser = Resparser::open(path)?;
    warn_small_block_size(resparser.storage(), options.block_size);
    resparser.run(options)
}

/// Punching a hole narrower than a filesystem block only zero-fills
/// it, so such ranges stay allocated and are found again on every run.
///
/// Returns true if a warning was logged.
#[cfg(target_os = "linux")]
fn warn_small_block_size(file: &File, block_size: BlockSize) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(metadata) = file.metadata() else {
        return false;
    };
    let fs_block_size = metadata.blksize();
    if block_size.to_u64() >= fs_block_size {
        return false;
    }
    log::warn!(
        "Block size {block_size} is smaller than the filesystem block size \
         {fs_block_size}, zero ranges smaller than that are not deallocated"
    );
    true
}
