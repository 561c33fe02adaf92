//! Command-line surface: port, bind address, and the logging/GUI collaborator switches.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

const MIN_PORT: u16 = 49152;

fn port_in_range(raw: &str) -> Result<u16, String> {
    let port: u16 = raw.parse().map_err(|_| "port must be a number".to_string())?;
    if port < MIN_PORT {
        return Err(format!("port must be in range {MIN_PORT}-65535"));
    }
    Ok(port)
}

/// Robot control server.
#[derive(Debug, Parser)]
#[command(about = "Robot control server")]
pub struct Arguments {
    /// Number of port to listen on
    #[arg(value_name = "PORT", value_parser = port_in_range)]
    pub port: u16,

    /// Host IP address to listen on
    #[arg(short = 'a', long = "host", value_name = "A.A.A.A", default_value = "127.0.0.1")]
    pub host: Ipv4Addr,

    /// Run with GUI
    #[arg(short = 'g', long = "gui", default_value_t = false)]
    pub gui: bool,

    /// Print messages to console
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,

    /// Log file
    #[arg(short = 'l', long = "log", value_name = "file")]
    pub log: Option<PathBuf>,
}
