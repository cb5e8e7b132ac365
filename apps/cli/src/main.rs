//! CourseWatch CLI: daily coursework digest and study guide generator.
//!
//! Collects upcoming work from one or more Canvas instances, flags major
//! assessments, builds study guides from material published before each
//! exam, and delivers everything to Telegram.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
