use std::process::ExitCode;

use log::LevelFilter;
use serde::Serialize;

mod job;

use job::{History, Job};

fn usage() {
    eprintln!("usage: xfe-cli run <job.json> [--verbose]");
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    // RUST_LOG still overrides the flag
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

#[derive(Serialize)]
struct Report<'a> {
    job: &'a str,
    timestamp: String,
    history: History,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    let positional: Vec<&str> = args
        .iter()
        .skip(1)
        .map(String::as_str)
        .filter(|a| !a.starts_with('-'))
        .collect();
    if positional.len() != 2 || positional[0] != "run" {
        usage();
        return ExitCode::from(2);
    }
    init_logging(verbose);

    let text = match std::fs::read_to_string(positional[1]) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("cannot read {}: {err}", positional[1]);
            return ExitCode::from(1);
        }
    };
    let job: Job = match serde_json::from_str(&text) {
        Ok(job) => job,
        Err(err) => {
            eprintln!("parse error: {err}");
            return ExitCode::from(1);
        }
    };

    let history = match job.run() {
        Ok(history) => history,
        Err(err) => {
            eprintln!("{}: {err}", job.name);
            return ExitCode::from(1);
        }
    };
    let report = Report {
        job: &job.name,
        timestamp: chrono::Utc::now().to_rfc3339(),
        history,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("cannot write report: {err}");
            ExitCode::from(1)
        }
    }
}
