// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(target_os = "linux")]
mod file;

/// Block size used to lay out test files. This matches the page size and
/// the filesystem block size of typical test machines, so holes punched
/// at these boundaries are visible to `SEEK_DATA`.
const TEST_BLOCK: usize = 4096;

/// One block of a test file.
#[derive(Clone, Copy, Debug)]
enum Layout {
    /// Allocated block filled with zeroes.
    Zero,
    /// Allocated block filled with non-zero data.
    Data(u8),
    /// Unallocated block.
    Hole,
}

/// Get the expected contents of a file built from `layout`.
fn expected_data(layout: &[Layout]) -> Vec<u8> {
    let mut data = Vec::new();
    for block in layout {
        let fill = match block {
            Layout::Data(byte) => *byte,
            Layout::Zero | Layout::Hole => 0,
        };
        data.extend(vec![fill; TEST_BLOCK]);
    }
    data
}

/// Get the byte range of block `index`.
fn block_range(index: usize) -> resparse::ByteRange {
    let start = u64::try_from(index * TEST_BLOCK).unwrap();
    let len = u64::try_from(TEST_BLOCK).unwrap();
    resparse::ByteRange::from_start_len(start, len).unwrap()
}
