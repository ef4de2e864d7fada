//! subvend binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match subvend::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
