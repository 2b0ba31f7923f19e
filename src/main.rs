use clap::Parser;
use momentum_scanner::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
