use crate::launcher::entry::AppRef;
use crate::launcher::DEFAULT_PORT;
use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "visit-ingest")]
#[command(about = "Visitor webhook ingestion service and its container launcher")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve the dependency manifest and produce an image directory
    Build {
        /// Build context holding the manifest and the entry file
        #[arg(long, default_value = ".")]
        context: PathBuf,

        #[arg(long, default_value = "dependencies.txt")]
        manifest: String,

        #[arg(long, default_value = "main:app")]
        app: AppRef,

        /// Package index: a TOML file or an http(s) base URL
        #[arg(long)]
        index: String,

        #[arg(long, default_value = "image")]
        out: PathBuf,
    },

    /// Start the application recorded in a built image
    Start {
        #[arg(long, default_value = "image")]
        image: PathBuf,

        #[command(flatten)]
        bind: BindArgs,
    },

    /// Load the entry file in place and serve it
    Serve {
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        #[arg(long, default_value = "main:app")]
        app: AppRef,

        #[command(flatten)]
        bind: BindArgs,
    },

    /// Wait until an address accepts TCP connections
    Probe {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,

        #[arg(long, default_value = "5")]
        timeout_seconds: u64,
    },
}

#[derive(Debug, Clone, Args)]
pub struct BindArgs {
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl BindArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
