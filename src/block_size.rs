// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::error::ResparseError;
use core::fmt::{self, Display, Formatter};
use core::num::NonZero;

/// Size of the blocks a file is scanned in.
///
/// The block size is guaranteed to be in the range
/// `512..=1_073_741_824`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct BlockSize(NonZero<u32>);

impl BlockSize {
    /// Smallest allowed block size.
    pub const MIN: u32 = 512;

    /// Largest allowed block size (1 GiB).
    pub const MAX: u32 = 1024 * 1024 * 1024;

    /// Block size used when none is specified.
    pub const DEFAULT: Self = Self(NonZero::new(65536).unwrap());

    /// Create a block size of `n` bytes.
    ///
    /// Returns [`ResparseError::InvalidBlockSize`] if `n` is not in
    /// the range [`BlockSize::MIN`]`..=`[`BlockSize::MAX`].
    pub fn new(n: u32) -> Result<Self, ResparseError> {
        if !(Self::MIN..=Self::MAX).contains(&n) {
            return Err(ResparseError::InvalidBlockSize(u64::from(n)));
        }
        NonZero::new(n)
            .map(Self)
            .ok_or(ResparseError::InvalidBlockSize(u64::from(n)))
    }

    /// Create a block size without the range check. Small block sizes
    /// keep the scan tests readable.
    #[cfg(test)]
    pub(crate) const fn unchecked(n: NonZero<u32>) -> Self {
        Self(n)
    }

    /// Block size in bytes.
    pub const fn to_u32(self) -> u32 {
        self.0.get()
    }

    /// Block size in bytes, as a file offset.
    pub const fn to_u64(self) -> u64 {
        // Cannot use `u64::from` in a `const fn`.
        #[expect(clippy::as_conversions)]
        {
            self.0.get() as u64
        }
    }

    /// Block size as a buffer length.
    ///
    /// # Panics
    ///
    /// Panics if the platform's `usize` is smaller than a `u32`.
    pub fn to_usize(self) -> usize {
        // OK to unwrap: all supported platforms have a `usize` at least
        // as big as a `u32`.
        usize::try_from(self.0.get()).unwrap()
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for BlockSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = ResparseError;

    fn try_from(n: u32) -> Result<Self, ResparseError> {
        Self::new(n)
    }
}
