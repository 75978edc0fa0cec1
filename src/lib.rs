// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Library for reclaiming the disk space used by zero-filled regions of
//! a file.
//!
//! A file is read in fixed-size blocks, skipping ranges that are
//! already holes. Runs of blocks that are entirely zero are merged and
//! handed back to the filesystem, turning them into holes. The file's
//! length and contents do not change.
//!
//! # Example
//!
//! ```no_run
//! use resparse::{BlockSize, Options, Resparser};
//!
//! let options = Options {
//!     block_size: BlockSize::new(4096)?,
//!     dry_run: false,
//! };
//! let summary = Resparser::open("disk.img")?.run(&options)?;
//! println!("{summary}");
//! # Ok::<(), resparse::ResparseError>(())
//! ```
//!
//! Any type implementing [`SparseStorage`] can be used in place of a
//! [`std::fs::File`]. [`MemFile`] is an in-memory implementation:
//!
//! ```
//! use resparse::{MemFile, Options, Resparser};
//!
//! let mut data = vec![0; 65536 * 2];
//! data[0] = 1;
//! let mut resparser = Resparser::new(MemFile::new(data))?;
//! let summary = resparser.run(&Options::default())?;
//! assert_eq!(summary.zeroed_bytes, 65536);
//! # Ok::<(), resparse::ResparseError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::as_conversions)]

mod allocated;
mod block_size;
mod byte_range;
mod coalesce;
mod deallocate;
mod detect;
mod error;
mod mem_file;
mod resparser;
mod storage;

pub use allocated::AllocatedRanges;
pub use block_size::BlockSize;
pub use byte_range::ByteRange;
pub use error::ResparseError;
pub use mem_file::{MemFile, MemIoError};
#[cfg(target_os = "linux")]
pub use resparser::resparse_path;
pub use resparser::{Options, Resparser, Summary};
pub use storage::{AllocationInfo, RangeBatch, SparseStorage};
