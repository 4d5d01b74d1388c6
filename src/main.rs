use std::process::ExitCode;

fn main() -> ExitCode {
    // Logging is initialised once arguments are parsed, so -v can select the
    // verbose subscriber. RUST_LOG overrides the level:
    //   RUST_LOG=seghash=trace seghash calc image.dd md5
    seghash::cli::run()
}
