// Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::validation::parse_size;

#[derive(Debug, Parser)]
#[command(
    name = "seghash",
    version,
    about = "Calculates segment hashes of an image file or verifies an image file against an existing segment hash file.\nExample: seghash calc inputfile.img md5",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Do not show the progress bar or the summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Print the run outcome as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calculate segment hashes into Hashes-<inputfile>-<hashtype>.csv, overwriting existing files
    Calc(CalcArgs),
    /// Verify an image against a segment hash file, writing diffs to Diffs-<hashfile>.csv.
    /// Exits with 255 on errors, otherwise with the number of different segments (at most 254)
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct CalcArgs {
    /// Segment size in bytes, minimum 2M and a multiple of 512.
    /// Accepts K/M/G/T (1024-based) and KB/MB/GB/TB (1000-based) suffixes
    #[arg(short = 's', long = "segmentsize", default_value = "4G", value_parser = parse_size)]
    pub segment_size: u64,

    /// Prefix replacing the default 'Hashes-<inputfile>'
    #[arg(short = 'o', long = "opref")]
    pub output_prefix: Option<String>,

    /// Input file to calculate segment hashes over
    #[arg(value_name = "INPUTFILE")]
    pub input: PathBuf,

    /// One or two of md5, sha1, sha224, sha256, sha384, sha512
    #[arg(value_name = "HASHTYPE", required = true)]
    pub hash_types: Vec<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Alternative file name for the diff report
    #[arg(short = 'd', long = "diffname")]
    pub diff_name: Option<String>,

    /// Input file to verify segment hashes over
    #[arg(value_name = "INPUTFILE")]
    pub input: PathBuf,

    /// Existing file with segment hashes
    #[arg(value_name = "HASHFILE")]
    pub hash_file: PathBuf,
}
