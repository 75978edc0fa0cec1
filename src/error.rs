// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::byte_range::ByteRange;
use core::fmt::{self, Display, Formatter};
use std::io;

/// Common error type for all resparse operations.
///
/// Every storage failure is fatal to a run. Ranges deallocated before
/// the failure stay deallocated.
#[derive(Debug)]
#[non_exhaustive]
pub enum ResparseError {
    /// The file could not be opened for reading and writing.
    FileOpen(io::Error),

    /// The size of the file could not be determined.
    SizeQuery(io::Error),

    /// The file could not be switched to sparse mode.
    SparseEnable(io::Error),

    /// The filesystem could not report which ranges of the file are
    /// allocated.
    RangeQuery(io::Error),

    /// Reading a block of the file failed.
    Read {
        /// Offset of the failed read.
        offset: u64,

        /// Underlying error.
        err: io::Error,
    },

    /// A read inside an allocated range returned no data. The file is
    /// shorter than the allocation map claims.
    UnexpectedEof {
        /// Offset of the read.
        offset: u64,
    },

    /// Releasing the storage behind a range failed.
    Deallocation {
        /// Range that could not be deallocated.
        range: ByteRange,

        /// Underlying error.
        err: io::Error,
    },

    /// The final allocation size of the file could not be determined.
    FinalInfoQuery(io::Error),

    /// A block size outside of
    /// [`BlockSize::MIN`]`..=`[`BlockSize::MAX`] was requested.
    ///
    /// [`BlockSize::MIN`]: crate::BlockSize::MIN
    /// [`BlockSize::MAX`]: crate::BlockSize::MAX
    InvalidBlockSize(u64),
}

impl ResparseError {
    /// If the error wraps an IO error, get the underlying error.
    pub fn as_io(&self) -> Option<&io::Error> {
        match self {
            Self::FileOpen(err)
            | Self::SizeQuery(err)
            | Self::SparseEnable(err)
            | Self::RangeQuery(err)
            | Self::FinalInfoQuery(err)
            | Self::Read { err, .. }
            | Self::Deallocation { err, .. } => Some(err),
            Self::UnexpectedEof { .. } | Self::InvalidBlockSize(_) => None,
        }
    }

    /// Whether the error comes from bad input rather than from the
    /// file or the filesystem.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidBlockSize(_))
    }
}

impl Display for ResparseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileOpen(err) => write!(f, "cannot open file: {err}"),
            Self::SizeQuery(err) => write!(f, "cannot get file size: {err}"),
            Self::SparseEnable(err) => write!(f, "cannot set sparse: {err}"),
            Self::RangeQuery(err) => {
                write!(f, "cannot get allocated ranges: {err}")
            }
            Self::Read { offset, err } => {
                write!(f, "cannot read file part at offset {offset}: {err}")
            }
            Self::UnexpectedEof { offset } => write!(
                f,
                "cannot read file part at offset {offset}: unexpected end of file"
            ),
            Self::Deallocation { range, err } => {
                write!(f, "cannot deallocate bytes {range}: {err}")
            }
            Self::FinalInfoQuery(err) => {
                write!(f, "cannot get file info: {err}")
            }
            Self::InvalidBlockSize(n) => write!(
                f,
                "block size {n} is not in the range {}..={}",
                crate::BlockSize::MIN,
                crate::BlockSize::MAX
            ),
        }
    }
}

// No `source`: `Display` already includes the underlying IO error.
impl std::error::Error for ResparseError {}
