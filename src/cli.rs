//! Command-line front end for the error-correcting parser.

use crate::cyk::CykParser;
use crate::error::Result;
use crate::grammar::Grammar;
use crate::symbol::DEFAULT_EPSILON;
use clap::{ArgGroup, Parser};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Finds the nearest in-language string for each input.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["string", "infile"])))]
pub struct Args {
    /// String to test
    #[arg(short, long)]
    pub string: Option<String>,

    /// File of strings to be tested, one per line
    #[arg(short, long)]
    pub infile: Option<PathBuf>,

    /// Grammar file of rules to use
    #[arg(short, long, default_value = "grammar.txt")]
    pub grammar_file: PathBuf,

    /// Character standing for ε in the grammar file
    #[arg(short, long, default_value_t = DEFAULT_EPSILON)]
    pub epsilon: char,
}

/// Main CLI runner.
///
/// Grammar problems abort the run; per-input failures are reported and the
/// remaining inputs still parse. The exit code is nonzero when no input
/// succeeded.
pub fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let grammar = Grammar::from_file(&args.grammar_file, args.epsilon)?;
    let parser = CykParser::build(&grammar)?;

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    if let Some(string) = &args.string {
        report(&parser, string, &mut succeeded, &mut failed);
    }
    if let Some(path) = &args.infile {
        for line in fs::read_to_string(path)?.lines() {
            report(&parser, line.trim_end(), &mut succeeded, &mut failed);
        }
    }

    Ok(if failed > 0 && succeeded == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Parses one input and prints its correction block.
fn report(parser: &CykParser, input: &str, succeeded: &mut usize, failed: &mut usize) {
    match parser.parse(input) {
        Ok(correction) => {
            println!("I : {}", correction.input);
            println!("I': {}", correction.corrected);
            println!("I\": {}", correction.stripped());
            println!("E : {}", correction.distance);
            *succeeded += 1;
        }
        Err(e) => {
            eprintln!("error: {}", e);
            *failed += 1;
        }
    }
}
