//! Provides the main entry point to the program.
use anyhow::Result;
use gpo::cli::run_cli;

fn main() -> Result<()> {
    run_cli()
}
