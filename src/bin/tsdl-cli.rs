//! tsdl - Command-line front end for the TSDL metadata parser
//!
//! Reads a TSDL metadata file, runs it through the full grammar/resolve/
//! materialize pipeline, and prints either a summary of the resulting
//! document or a formatted parse error.
//!
//! # Usage
//!
//! ```bash
//! tsdl path/to/metadata.tsdl
//! tsdl --json path/to/metadata.tsdl
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tsdl::Doc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TSDL metadata file
    file: PathBuf,

    /// Print the full document model as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    #[cfg(feature = "cli")]
    env_logger::init();

    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    match tsdl::parse(&source) {
        Ok(doc) if cli.json => match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to serialize document: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(doc) => {
            print_summary(&doc);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.to_formatted_string());
            ExitCode::FAILURE
        }
    }
}

fn print_summary(doc: &Doc) {
    match &doc.trace {
        Some(trace) => {
            println!("trace {}.{} ({:?})", trace.major, trace.minor, trace.byte_order);
            if let Some(uuid) = trace.uuid {
                println!("  uuid: {uuid}");
            }
        }
        None => println!("trace: (none)"),
    }
    println!("clocks ({}):", doc.clocks.len());
    for name in doc.clocks.keys() {
        println!("  - {name}");
    }
    println!("streams ({}):", doc.streams.len());
    for (id, stream) in &doc.streams {
        println!("  - stream {id}: {} event(s)", stream.events.len());
    }
}
