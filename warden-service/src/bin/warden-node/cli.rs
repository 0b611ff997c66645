use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "warden-node")]
#[command(about = "Warden threshold custody node", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Override JSON-RPC listen address
    #[arg(short, long)]
    pub rpc_addr: Option<String>,

    /// Log filter expression, e.g. "info" or "warden_core=debug,iroh=info"
    #[arg(short, long)]
    pub log_filters: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
