// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use core::fmt::{self, Display, Formatter};

/// Half-open byte interval `[start, end)` within a file.
///
/// Used both for regions the filesystem backs with storage and for
/// runs of zero bytes waiting to be deallocated. `end` is never less
/// than `start`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Empty range at offset zero.
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    /// Create a range covering `start..end`.
    ///
    /// Returns `None` if `end < start`.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Option<Self> {
        if end < start {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// Create a range of `len` bytes beginning at `start`.
    ///
    /// Returns `None` if the end of the range overflows a `u64`.
    #[must_use]
    pub fn from_start_len(start: u64, len: u64) -> Option<Self> {
        let end = start.checked_add(len)?;
        Some(Self { start, end })
    }

    /// First byte of the range.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// One past the last byte of the range.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes in the range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range contains no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `next` begins exactly where `self` ends, with no gap.
    #[must_use]
    pub const fn is_followed_by(&self, next: &Self) -> bool {
        self.end == next.start
    }

    /// Get a range with the same start as `self` and the end of `next`.
    ///
    /// Returns `None` if `next` ends before `self` starts.
    #[must_use]
    pub const fn extend_to(&self, next: &Self) -> Option<Self> {
        Self::new(self.start, next.end)
    }

    /// Get the part of `self` that lies within `other`, or `None` if
    /// the two ranges do not share any bytes.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }
}

impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}...{})", self.start, self.end)
    }
}
