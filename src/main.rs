use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Args;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    commands::run_limiter_command(args)
}
