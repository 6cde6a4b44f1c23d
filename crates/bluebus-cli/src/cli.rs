//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Service UUID the device must advertise (e.g. 180d or the full 128-bit form)
    pub uuid: String,

    /// Discovery timeout in seconds; 0 waits indefinitely
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Adapter to use (e.g. hci0)
    #[arg(short, long)]
    pub adapter: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
