// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::byte_range::ByteRange;
use std::io;

/// One answer to [`SparseStorage::query_allocated_ranges`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeBatch {
    /// Allocated ranges, sorted by start and non-overlapping.
    pub ranges: Vec<ByteRange>,

    /// True if the batch filled up before the queried region was
    /// exhausted. The caller should query again starting at the end of
    /// the last range.
    pub more_data: bool,
}

/// Size of a file as seen by the filesystem.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AllocationInfo {
    /// Length of the file in bytes.
    pub logical_size: u64,

    /// Number of bytes of storage backing the file.
    pub allocated_size: u64,
}

impl AllocationInfo {
    /// Number of bytes of the file that are not backed by storage.
    ///
    /// The allocated size is rounded up to the filesystem's allocation
    /// unit, so it can exceed the logical size. In that case zero is
    /// returned.
    #[must_use]
    pub fn deallocated_bytes(&self) -> u64 {
        self.logical_size.saturating_sub(self.allocated_size)
    }
}

/// Interface used by [`Resparser`] to inspect and modify the file being
/// made sparse.
///
/// [`Resparser`]: crate::Resparser
pub trait SparseStorage {
    /// Get the length of the file in bytes.
    fn file_size(&mut self) -> io::Result<u64>;

    /// Prepare the file for deallocation requests.
    fn enable_sparse(&mut self) -> io::Result<()>;

    /// Get the allocated ranges within `region`, returning at most
    /// `max_ranges` ranges. Returned ranges are clipped to `region`.
    fn query_allocated_ranges(
        &mut self,
        region: ByteRange,
        max_ranges: usize,
    ) -> io::Result<RangeBatch>;

    /// Read bytes into `dst`, starting at `offset`.
    ///
    /// Returns the number of bytes read, which may be less than
    /// `dst.len()`. Zero is returned at the end of the file.
    fn read_bytes(&mut self, offset: u64, dst: &mut [u8]) -> io::Result<usize>;

    /// Release the storage behind `range`. Afterwards the range reads
    /// as zeroes and the file length is unchanged.
    fn deallocate(&mut self, range: ByteRange) -> io::Result<()>;

    /// Get the logical and allocated sizes of the file.
    fn allocation_info(&mut self) -> io::Result<AllocationInfo>;
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use nix::errno::Errno;
    use nix::fcntl::{FallocateFlags, fallocate};
    use nix::unistd::{Whence, lseek};
    use std::fs::File;
    use std::io::{ErrorKind, Read, Seek, SeekFrom};
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::MetadataExt;

    /// Unit of `st_blocks`, independent of the filesystem block size.
    const STAT_BLOCK_SIZE: u64 = 512;

    fn to_off_t(val: u64) -> io::Result<libc::off_t> {
        libc::off_t::try_from(val).map_err(|_| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("offset {val} does not fit in off_t"),
            )
        })
    }

    fn from_off_t(val: libc::off_t) -> io::Result<u64> {
        u64::try_from(val).map_err(|_| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("lseek returned negative offset {val}"),
            )
        })
    }

    /// Get the first byte at or after `offset` that holds data. Returns
    /// `None` if there is no data past `offset`.
    fn seek_data(file: &File, offset: u64) -> io::Result<Option<u64>> {
        match lseek(file.as_raw_fd(), to_off_t(offset)?, Whence::SeekData) {
            Ok(pos) => from_off_t(pos).map(Some),
            Err(Errno::ENXIO) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Get the first byte at or after `offset` that is in a hole. The
    /// end of the file counts as a hole.
    fn seek_hole(file: &File, offset: u64) -> io::Result<u64> {
        let pos = lseek(file.as_raw_fd(), to_off_t(offset)?, Whence::SeekHole)?;
        from_off_t(pos)
    }

    impl SparseStorage for File {
        fn file_size(&mut self) -> io::Result<u64> {
            Ok(self.metadata()?.len())
        }

        fn enable_sparse(&mut self) -> io::Result<()> {
            // Linux filesystems that support holes do so for every
            // regular file, there is no per-file flag to set.
            if self.metadata()?.file_type().is_file() {
                Ok(())
            } else {
                Err(io::Error::new(
                    ErrorKind::Unsupported,
                    "not a regular file",
                ))
            }
        }

        fn query_allocated_ranges(
            &mut self,
            region: ByteRange,
            max_ranges: usize,
        ) -> io::Result<RangeBatch> {
            let mut batch = RangeBatch::default();
            let mut pos = region.start();

            while pos < region.end() {
                if batch.ranges.len() >= max_ranges {
                    batch.more_data = true;
                    break;
                }

                let Some(data_start) = seek_data(self, pos)? else {
                    break;
                };
                if data_start >= region.end() {
                    break;
                }
                let data_end = seek_hole(self, data_start)?.min(region.end());

                let range =
                    ByteRange::new(data_start, data_end).ok_or_else(|| {
                        io::Error::new(
                            ErrorKind::InvalidData,
                            format!(
                                "hole at {data_end} precedes data at {data_start}"
                            ),
                        )
                    })?;
                batch.ranges.push(range);
                pos = data_end;
            }

            Ok(batch)
        }

        fn read_bytes(
            &mut self,
            offset: u64,
            dst: &mut [u8],
        ) -> io::Result<usize> {
            self.seek(SeekFrom::Start(offset))?;
            loop {
                match self.read(dst) {
                    Err(err) if err.kind() == ErrorKind::Interrupted => {}
                    res => return res,
                }
            }
        }

        fn deallocate(&mut self, range: ByteRange) -> io::Result<()> {
            // fallocate rejects a zero length.
            if range.is_empty() {
                return Ok(());
            }

            fallocate(
                self.as_raw_fd(),
                FallocateFlags::FALLOC_FL_PUNCH_HOLE
                    | FallocateFlags::FALLOC_FL_KEEP_SIZE,
                to_off_t(range.start())?,
                to_off_t(range.len())?,
            )?;
            Ok(())
        }

        fn allocation_info(&mut self) -> io::Result<AllocationInfo> {
            let metadata = self.metadata()?;
            Ok(AllocationInfo {
                logical_size: metadata.len(),
                allocated_size: metadata
                    .blocks()
                    .saturating_mul(STAT_BLOCK_SIZE),
            })
        }
    }
}
