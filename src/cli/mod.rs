//! Command-line front end
//!
//! Parses arguments, validates inputs, runs [`calculate`] or [`verify`] with
//! file-backed outputs and a progress bar, and maps the outcome to an exit
//! code: 0 for a successful calc, the verify exit code for verify, 255 for
//! any argument, validation or run failure.

pub mod args;
pub mod progress;
pub mod validation;

pub use args::{CalcArgs, Cli, Command, VerifyArgs};
pub use progress::ProgressTracker;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use crate::calc::{calculate, CalcOptions};
use crate::error::Result;
use crate::logging;
use crate::pipeline::FileSinks;
use crate::verify::{verify, VerifyOptions, FAILURE_EXIT_CODE};

/// Parse the process arguments, run the command and return its exit code
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => FAILURE_EXIT_CODE,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init(!cli.quiet);
    }

    let stdin = io::stdin();
    match execute(&cli, &mut stdin.lock(), &mut io::stdout()) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(%err, internal = err.is_internal(), "Run failed");
            eprintln!("seghash: error: {err}");
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

/// Run a parsed command. Prompts read from `input`; prompts and results go
/// to `output`.
pub fn execute<I: BufRead, O: Write>(cli: &Cli, input: &mut I, output: &mut O) -> Result<u8> {
    match &cli.command {
        Command::Calc(args) => execute_calc(cli, args, input, output),
        Command::Verify(args) => execute_verify(cli, args, input, output),
    }
}

fn execute_calc<I: BufRead, O: Write>(cli: &Cli, args: &CalcArgs, input: &mut I, output: &mut O) -> Result<u8> {
    let algorithms = validation::hash_algorithms(&args.hash_types)?;
    validation::check_segment_size(args.segment_size)?;
    let prefix = validation::output_prefix(&args.input, args.output_prefix.as_deref())?;

    let mut image = validation::open_non_empty(&args.input, "<inputfile>", "calculate segment hashes over")?;
    if !validation::confirm_raw_input(&args.input, cli.yes, input, output)? {
        info!(input = %args.input.display(), "Declined to hash forensic container as raw file");
        return Ok(0);
    }

    let tracker = tracker(cli, image.metadata()?.len());
    let options = CalcOptions::new(args.segment_size, algorithms);
    let outcome = calculate(&mut image, &options, FileSinks::Prefixed(prefix), tracker.callback())?;

    let summary = tracker.finish(outcome.summary(&args.input.to_string_lossy()));
    report(cli, &outcome, &summary, output)?;
    Ok(0)
}

fn execute_verify<I: BufRead, O: Write>(cli: &Cli, args: &VerifyArgs, input: &mut I, output: &mut O) -> Result<u8> {
    let report_path = validation::diff_report_path(&args.hash_file, args.diff_name.as_deref())?;

    let mut image = validation::open_non_empty(&args.input, "<inputfile>", "verify segment hashes against")?;
    if !validation::confirm_raw_input(&args.input, cli.yes, input, output)? {
        info!(input = %args.input.display(), "Declined to verify forensic container as raw file");
        return Ok(0);
    }
    let mut manifest = validation::open_non_empty(&args.hash_file, "<hashfile>", "verify segment hashes against")?;
    validation::check_manifest_structure(&mut manifest)?;

    let tracker = tracker(cli, image.metadata()?.len());
    let outcome = verify(
        &mut image,
        manifest,
        &VerifyOptions::default(),
        FileSinks::Fixed(report_path),
        tracker.callback(),
    )?;

    let summary = tracker.finish(outcome.summary(&args.input.to_string_lossy(), &args.hash_file.to_string_lossy()));
    report(cli, &outcome, &summary, output)?;
    Ok(outcome.exit_code())
}

fn tracker(cli: &Cli, total: u64) -> ProgressTracker {
    if cli.quiet {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::new(total)
    }
}

/// Print the outcome as JSON, or the summary unless quiet
fn report<T: Serialize, O: Write>(cli: &Cli, outcome: &T, summary: &str, output: &mut O) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(outcome).map_err(io::Error::from)?;
        writeln!(output, "{json}")?;
    } else if !cli.quiet {
        writeln!(output, "{summary}")?;
    }
    Ok(())
}
