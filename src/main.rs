//! Error-Correcting Context-Free Parser
//!
//! Reads a grammar file and, for each input string, prints the nearest
//! string in the grammar's language and the edit distance to it.

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    match ec_parser::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
