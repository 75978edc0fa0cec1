// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(not(target_os = "linux"))]
compile_error!("resparse-tool only supports Linux");

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::LevelFilter;
use resparse::{BlockSize, Options, ResparseError, Summary};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Reclaim the disk space used by zero-filled regions of a file.
///
/// Blocks of zeroes are turned into holes. The file's length and
/// contents are unchanged.
#[derive(Debug, Parser)]
#[command(name = "resparse", version)]
struct Opt {
    /// Input file path.
    input: PathBuf,

    /// Block size in bytes.
    #[arg(
        short,
        long = "blockSize",
        visible_alias = "block-size",
        default_value_t = BlockSize::DEFAULT.to_u32(),
        value_parser = clap::value_parser!(u32)
            .range(i64::from(BlockSize::MIN)..=i64::from(BlockSize::MAX)),
    )]
    block_size: u32,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Find zero ranges without deallocating them.
    #[arg(short = 'n', long)]
    dry_run: bool,
}

/// Send log records to stdout in verbose mode, so that progress lines
/// are interleaved with the final summary. `RUST_LOG` overrides the
/// level.
fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    if verbose {
        builder
            .filter_level(LevelFilter::Debug)
            .target(env_logger::Target::Stdout)
            .format(|buf, record| writeln!(buf, "{}", record.args()));
    } else {
        builder.filter_level(LevelFilter::Warn).format(|buf, record| {
            writeln!(buf, "{}: {}", record.level(), record.args())
        });
    }
    builder.parse_default_env();
    builder.init();
}

fn run(opt: &Opt) -> Result<Summary> {
    let options = Options {
        block_size: BlockSize::new(opt.block_size)?,
        dry_run: opt.dry_run,
    };
    let summary = resparse::resparse_path(&opt.input, &options)
        .with_context(|| format!("Failed to resparse {}", opt.input.display()))?;
    Ok(summary)
}

fn print_usage() {
    eprintln!();
    eprintln!("{}", Opt::command().render_help());
}

fn parse_error(err: &clap::Error) -> ExitCode {
    if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
    {
        // Ignore errors writing the help text.
        let _ = err.print();
        return ExitCode::SUCCESS;
    }
    eprint!("{err}");
    print_usage();
    ExitCode::FAILURE
}

fn run_error(err: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {err:#}");
    if err
        .downcast_ref::<ResparseError>()
        .is_some_and(ResparseError::is_argument_error)
    {
        print_usage();
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(err) => return parse_error(&err),
    };
    init_logging(opt.verbose);

    match run(&opt) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => run_error(&err),
    }
}
