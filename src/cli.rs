// src/cli.rs
use std::path::PathBuf;

use clap::Parser;

/// Data acquisition from a Tektronix TDS 3034 over its serial port.
#[derive(Parser, Debug)]
#[command(name = "tekacq", version, about = "Data acquisition from Tektronix TDS 3034")]
pub struct Args {
    /// Serial communication port, e.g. COM3 or /dev/ttyUSB0
    #[arg(value_name = "COM#")]
    pub port: String,

    /// Channels to read data from, e.g. "134" or "24" (default: 12)
    #[arg(short, long)]
    pub channels: Option<String>,

    /// Smoothen the data
    #[arg(short, long)]
    pub smooth: bool,

    /// Directory where to save the data (default: execution directory)
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}
