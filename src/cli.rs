//! Command line interface for the `mgmtframe` binary.
//!
//! Shared with the build script, which renders the manual page from it.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `mgmtframe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mgmtframe",
    version,
    about = "Domain-controller management protocol server"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:9999")]
    pub bind: SocketAddr,

    /// Number of accept workers; defaults to the available parallelism.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Largest request frame accepted, in bytes.
    #[arg(long)]
    pub max_frame_length: Option<usize>,

    /// Address serving Prometheus metrics; disabled when absent.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}
