use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use scriptgen::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stderr, so `render` output on stdout stays clean
    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .filter_level(cli.verbose.log_level_filter())
        .target(env_logger::Target::Stderr)
        .init();

    match scriptgen::run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
