use clap::Parser;

use std::path::PathBuf;

/// Multiplex GNSS receivers onto gpsd-protocol clients
#[derive(Clone, Debug, Default, Parser)]
#[clap(about, version)]
pub struct Args {
    /// Read-only, never write to devices
    #[clap(short = 'b', long)]
    pub readonly: bool,

    /// Debug level, 0 warn through 3 trace
    #[clap(short = 'D', long)]
    pub debug: Option<u8>,

    /// Listen on every interface
    #[clap(short = 'G', long = "listenany")]
    pub listen_any: bool,

    /// Stay in the foreground
    #[clap(short = 'N', long)]
    pub foreground: bool,

    /// Open command-line devices at startup and never release them
    #[clap(short = 'n', long)]
    pub nowait: bool,

    /// Passive, never reconfigure receivers
    #[clap(short = 'p', long)]
    pub passive: bool,

    /// Trust receiver time before the first fix
    #[clap(short = 'r', long = "badtime")]
    pub battery_rtc: bool,

    /// Client port
    #[clap(short = 'S', long)]
    pub port: Option<u16>,

    /// Pin the serial speed
    #[clap(short = 's', long)]
    pub speed: Option<u32>,

    /// Pin the serial framing, such as 8N1
    #[clap(short = 'f', long)]
    pub framing: Option<String>,

    /// PID file
    #[clap(short = 'P', long = "pidfile")]
    pub pid_file: Option<PathBuf>,

    /// Control socket
    #[clap(short = 'F', long = "sockfile")]
    pub control_socket: Option<PathBuf>,

    /// Configuration file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Device paths or URIs
    pub devices: Vec<String>,
}
