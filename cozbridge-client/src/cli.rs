//! Command-line argument parsing for the cozbridge binary

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// cozbridge - drive a robot through its websocket bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Peer websocket URL (overrides the config file)
    #[arg(long, env = "COZBRIDGE_URL")]
    pub url: Option<String>,

    /// Configuration file (defaults to the XDG config location)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// How long to wait for the connection to open, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub connect_timeout: u64,

    /// Also write logs to the log file under the state directory
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run one block operation, e.g. `run drive_straight DISTANCE=100 AWAIT=true`
    Run {
        opcode: String,
        /// Block arguments as KEY=VALUE
        args: Vec<String>,
    },

    /// Read one sensor, e.g. `sensor battery_voltage`
    Sensor { name: String },

    /// Print the robot state snapshot
    State {
        /// Ask the peer for a fresh snapshot
        #[arg(long)]
        refresh: bool,
    },

    /// Save camera frames to a directory
    Frames {
        #[arg(long, short = 'o')]
        out: PathBuf,

        #[arg(long, short = 'n', default_value_t = 1)]
        count: usize,
    },

    /// Persist the protocol diagnostics setting
    Verbose { mode: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the command needs a connection to the peer
    pub fn needs_connection(&self) -> bool {
        !matches!(self.command, Command::Verbose { .. })
    }
}
