// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::byte_range::ByteRange;

/// Merges runs of zero blocks into maximal ranges before they are
/// deallocated.
///
/// At most one range is pending at a time. A zero range that starts
/// exactly where the pending range ends extends it; any other range
/// pushes the pending range out to be deallocated and takes its place.
/// Ranges must be pushed in increasing order of offset.
#[derive(Debug, Default)]
pub(crate) struct DeallocationQueue {
    pending: Option<ByteRange>,
}

impl DeallocationQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a newly found zero range.
    ///
    /// Returns the previously pending range if `range` is not adjacent
    /// to it. The returned range is complete and should be deallocated
    /// now; `range` stays pending until the next call to `push` or
    /// [`DeallocationQueue::flush`].
    #[must_use]
    pub(crate) fn push(&mut self, range: ByteRange) -> Option<ByteRange> {
        let Some(pending) = self.pending.take() else {
            self.pending = Some(range);
            return None;
        };
        debug_assert!(pending.end() <= range.start());

        if pending.is_followed_by(&range) {
            // OK to unwrap: `range` starts at the end of `pending`, so
            // it can't end before `pending` starts.
            self.pending = Some(pending.extend_to(&range).unwrap());
            None
        } else {
            self.pending = Some(range);
            Some(pending)
        }
    }

    /// Remove and return the pending range, if any.
    #[must_use]
    pub(crate) fn flush(&mut self) -> Option<ByteRange> {
        self.pending.take()
    }

    /// Get the pending range without removing it.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> Option<&ByteRange> {
        self.pending.as_ref()
    }
}
