//! Sidecar: registers services running next to it with a rebalance proxy.

use clap::{Parser, Subcommand};
use rebalance_sdk::SideCar;

#[derive(Parser)]
#[command(name = "sidecar")]
#[command(about = "Register local services with a rebalance proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the proxy to register this machine on the given ports
    Join {
        /// Proxy base URL, e.g. http://proxy:9000
        #[arg(short, long)]
        url: String,

        /// Comma-separated ports the local services listen on
        #[arg(short = 'p', long, value_delimiter = ',', default_value = "80")]
        service_ports: Vec<u16>,
    },
    /// Ask the proxy to register explicit service URLs
    JoinConfig {
        /// Proxy base URL, e.g. http://proxy:9000
        #[arg(short, long)]
        url: String,

        /// Comma-separated service URLs
        #[arg(short = 's', long, value_delimiter = ',', required = true)]
        service_hosts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let replies = match cli.command {
        Commands::Join { url, service_ports } => sidecar(&url)?.join(&service_ports).await?,
        Commands::JoinConfig { url, service_hosts } => {
            sidecar(&url)?.join_from_config(&service_hosts).await?
        }
    };

    for reply in replies {
        println!("{}", reply);
    }
    Ok(())
}

fn sidecar(url: &str) -> Result<SideCar, Box<dyn std::error::Error>> {
    if url.trim().is_empty() {
        return Err("a proxy url is required".into());
    }
    Ok(SideCar::new(url))
}
