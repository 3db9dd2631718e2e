pub mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "podns")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Node-local DNS for workload pods, backed by the kubelet pod list", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to a YAML or JSON config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Serve DNS for cluster.local. from the kubelet pod list")]
    Serve {
        #[arg(short, long, help = "UDP address to listen on")]
        bind: Option<SocketAddr>,

        #[arg(short, long, help = "Resolver for names outside cluster.local.")]
        upstream: Option<SocketAddr>,
    },
    #[command(about = "Fetch pods once and print the records that would be served")]
    Pods,
}
