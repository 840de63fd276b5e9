//! Peptree CLI Binary
//!
//! Command-line interface for the protein tag-tree index.

use clap::Parser;
use peptree::cli::{Cli, CliContext};
use peptree::logging::init_logging;
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&context.logging_config(&cli))) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
