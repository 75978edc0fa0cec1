// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{Layout, TEST_BLOCK, block_range, expected_data};
use anyhow::Result;
use resparse::{
    AllocatedRanges, BlockSize, ByteRange, Options, ResparseError, Resparser,
    SparseStorage, resparse_path,
};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary file laid out block by block.
struct TestFile {
    // Held to keep the directory alive.
    _dir: TempDir,
    path: PathBuf,
}

impl TestFile {
    /// Create a file from `layout`. Holes are created by seeking past
    /// them, so they are never allocated.
    fn new(layout: &[Layout]) -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("file");

        let mut file = File::create(&path)?;
        for block in layout {
            match block {
                Layout::Zero => file.write_all(&[0; TEST_BLOCK])?,
                Layout::Data(byte) => file.write_all(&[*byte; TEST_BLOCK])?,
                Layout::Hole => {
                    file.seek(SeekFrom::Current(i64::try_from(TEST_BLOCK)?))?;
                }
            }
        }
        // Extend over a trailing hole.
        file.set_len(u64::try_from(layout.len() * TEST_BLOCK)?)?;
        file.sync_all()?;

        Ok(Self { _dir: dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Get the allocated ranges as seen by the filesystem.
    fn allocated(&self) -> Result<Vec<ByteRange>> {
        let mut file = File::open(&self.path)?;
        let size = file.file_size()?;
        let ranges = AllocatedRanges::query(&mut file, size)?;
        Ok(ranges.iter().copied().collect())
    }
}

fn options() -> Result<Options> {
    Ok(Options {
        block_size: BlockSize::new(u32::try_from(TEST_BLOCK)?)?,
        dry_run: false,
    })
}

#[test]
fn test_resparse_zero_data_zero() -> Result<()> {
    use Layout::*;
    let layout = [Zero, Data(0xab), Zero];
    let file = TestFile::new(&layout)?;

    let summary = resparse_path(file.path(), &options()?)?;
    assert_eq!(summary.zeroed_bytes, 2 * 4096);
    assert_eq!(summary.deallocation_requests, 2);
    assert_eq!(summary.file_size, 3 * 4096);

    assert_eq!(fs::read(file.path())?, expected_data(&layout));
    assert_eq!(fs::metadata(file.path())?.len(), 3 * 4096);
    assert_eq!(file.allocated()?, [block_range(1)]);
    Ok(())
}

#[test]
fn test_resparse_all_zero() -> Result<()> {
    use Layout::*;
    let layout = [Zero, Zero];
    let file = TestFile::new(&layout)?;

    let summary = resparse_path(file.path(), &options()?)?;
    assert_eq!(summary.zeroed_bytes, 2 * 4096);
    assert_eq!(summary.deallocation_requests, 1);
    assert_eq!(summary.allocation.deallocated_bytes(), 2 * 4096);

    assert_eq!(fs::read(file.path())?, expected_data(&layout));
    assert!(file.allocated()?.is_empty());
    Ok(())
}

/// Test that zero ranges on either side of an existing hole are
/// deallocated separately.
#[test]
fn test_resparse_existing_hole() -> Result<()> {
    use Layout::*;
    let layout = [Data(1), Zero, Hole, Zero, Data(2)];
    let file = TestFile::new(&layout)?;
    assert_eq!(file.allocated()?, [
        ByteRange::new(0, 2 * 4096).unwrap(),
        ByteRange::new(3 * 4096, 5 * 4096).unwrap(),
    ]);

    let summary = resparse_path(file.path(), &options()?)?;
    assert_eq!(summary.zeroed_bytes, 2 * 4096);
    assert_eq!(summary.deallocation_requests, 2);
    assert_eq!(summary.allocated_before, 4 * 4096);

    assert_eq!(fs::read(file.path())?, expected_data(&layout));
    assert_eq!(file.allocated()?, [block_range(0), block_range(4)]);
    Ok(())
}

/// Test that a second run has nothing left to do.
#[test]
fn test_resparse_twice() -> Result<()> {
    use Layout::*;
    let layout = [Hole, Zero, Data(3), Zero, Zero, Data(4), Hole];
    let file = TestFile::new(&layout)?;

    let first = resparse_path(file.path(), &options()?)?;
    assert_eq!(first.zeroed_bytes, 3 * 4096);

    let second = resparse_path(file.path(), &options()?)?;
    assert_eq!(second.zeroed_bytes, 0);
    assert_eq!(second.deallocation_requests, 0);
    assert_eq!(second.allocated_before, 2 * 4096);

    assert_eq!(fs::read(file.path())?, expected_data(&layout));
    Ok(())
}

/// Test that zero ranges smaller than a filesystem block are zero-filled
/// but stay allocated, so a second run finds them again. Only runs of
/// whole filesystem blocks are idempotent.
#[test]
fn test_resparse_twice_small_block() -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let mut data = vec![0xcd; TEST_BLOCK];
    data[..512].fill(0);
    let dir = TempDir::new()?;
    let path = dir.path().join("file");
    fs::write(&path, &data)?;
    let fs_block_size = fs::metadata(&path)?.blksize();

    let options = Options {
        block_size: BlockSize::new(512)?,
        dry_run: false,
    };
    let first = resparse_path(&path, &options)?;
    assert_eq!(first.zeroed_bytes, 512);

    let second = resparse_path(&path, &options)?;
    let expected = if fs_block_size > 512 { 512 } else { 0 };
    assert_eq!(second.zeroed_bytes, expected);

    assert_eq!(fs::read(&path)?, data);
    Ok(())
}

#[test]
fn test_resparse_dry_run() -> Result<()> {
    use Layout::*;
    let layout = [Zero, Data(5), Zero];
    let file = TestFile::new(&layout)?;
    let before = file.allocated()?;

    let options = Options {
        dry_run: true,
        ..options()?
    };
    let summary = resparse_path(file.path(), &options)?;
    assert_eq!(summary.zeroed_bytes, 2 * 4096);
    assert_eq!(file.allocated()?, before);
    Ok(())
}

#[test]
fn test_resparse_empty_file() -> Result<()> {
    let file = TestFile::new(&[])?;
    let summary = resparse_path(file.path(), &options()?)?;
    assert_eq!(summary.zeroed_bytes, 0);
    assert_eq!(summary.file_size, 0);
    Ok(())
}

#[test]
fn test_resparse_open_error() -> Result<()> {
    let dir = TempDir::new()?;
    let err = resparse_path(dir.path().join("missing"), &options()?)
        .unwrap_err();
    assert!(matches!(err, ResparseError::FileOpen(_)));
    assert_eq!(
        err.as_io().unwrap().kind(),
        std::io::ErrorKind::NotFound
    );
    Ok(())
}

/// Test the `File` query directly, with a batch size small enough to
/// need more than one query.
#[test]
fn test_file_query_allocated_ranges() -> Result<()> {
    use Layout::*;
    let layout = [Data(1), Hole, Data(2), Hole, Data(3)];
    let test_file = TestFile::new(&layout)?;
    let mut file = OpenOptions::new().read(true).open(test_file.path())?;

    let whole = ByteRange::new(0, 5 * 4096).unwrap();
    let batch = file.query_allocated_ranges(whole, 2)?;
    assert_eq!(batch.ranges, [block_range(0), block_range(2)]);
    assert!(batch.more_data);

    let rest = ByteRange::new(3 * 4096, 5 * 4096).unwrap();
    let batch = file.query_allocated_ranges(rest, 2)?;
    assert_eq!(batch.ranges, [block_range(4)]);
    assert!(!batch.more_data);

    // Ranges are clipped to the queried region.
    let part = ByteRange::new(100, 200).unwrap();
    let batch = file.query_allocated_ranges(part, 2)?;
    assert_eq!(batch.ranges, [part]);
    Ok(())
}

/// Test that the scan works through a `Resparser` over an already open
/// file, and that the file can be used again afterwards.
#[test]
fn test_resparser_into_inner() -> Result<()> {
    use Layout::*;
    let layout = [Data(9), Zero];
    let test_file = TestFile::new(&layout)?;

    let mut resparser = Resparser::open(test_file.path())?;
    assert_eq!(resparser.file_size(), 2 * 4096);
    let summary = resparser.run(&options()?)?;
    assert_eq!(summary.zeroed_bytes, 4096);

    let mut file = resparser.into_inner();
    let mut buf = [0xff; 4];
    assert_eq!(file.read_bytes(4096, &mut buf)?, 4);
    assert_eq!(buf, [0; 4]);
    Ok(())
}
