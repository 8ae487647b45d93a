use std::process::ExitCode;

use colored::Colorize;

fn main() -> ExitCode {
    match anasim::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
