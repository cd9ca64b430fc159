//! CLI argument definitions

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "boilcheck")]
#[command(author, version)]
#[command(about = "Check tagged SQL constants against a live database schema")]
pub struct Args {
    /// Directory to load packages from
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// TOML configuration file containing the driver section
    #[arg(long, default_value = "sqlboiler.toml")]
    pub config: PathBuf,

    /// Driver name, or path to a driver binary
    #[arg(long, default_value = "psql")]
    pub driver: String,

    /// Also print every accepted tagged call
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug tracing
    #[arg(long)]
    pub debug: bool,

    /// Package patterns to load (globs relative to --dir)
    pub packages: Vec<String>,
}
