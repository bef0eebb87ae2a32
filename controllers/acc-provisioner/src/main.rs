//! ACC Provisioner
//!
//! Provisions the accelerator complex (ACC) of an IPU:
//! - boots the IMC from an installation ISO over Redfish, serving a local ISO
//!   over HTTP when needed
//! - puts the provisioning host's cluster port on the ACC's subnet
//! - reserves the ACC's address in dhcpd
//! - reboots the IMC and opens the first SSH session into the ACC
//!
//! Exit codes: 0 success, 2 invalid input, 3 remote boot, 4 network
//! configuration, 5 DHCP configuration, 6 connectivity.

mod backoff;
mod cli;
mod clock;
mod config;
mod connectivity;
mod dhcp_lease;
mod error;
mod network_port;
mod orchestrator;
mod remote_boot;

#[cfg(test)]
mod test_utils;

use crate::cli::Cli;
use crate::clock::TokioClock;
use crate::config::ClusterConfig;
use crate::error::ProvisionError;
use crate::orchestrator::{HostServices, ProvisionOptions, ProvisioningOrchestrator};
use clap::Parser;
use host_exec::{LocalHost, PingProber, RusshConnector};
use redfish_client::RedfishClient;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), ProvisionError> {
    let config = ClusterConfig::load(&cli.config)
        .map_err(|e| ProvisionError::validation("config", format!("{:#}", e)))?;
    config.validate()?;
    let node = config.select_node(cli.node.as_deref())?.clone();

    info!("Configuration:");
    info!("  Cluster: {}", config.name);
    info!("  Node: {} (IMC {}, ACC {})", node.name, node.bmc, node.ip);
    info!("  Cluster port: {}", config.network_api_port);

    let redfish = RedfishClient::new(
        node.redfish_url(),
        node.bmc_user.clone(),
        node.bmc_password.clone(),
    )
    .map_err(|e| ProvisionError::remote_boot("remote-boot", e))?;

    let hosts = HostServices {
        local: Arc::new(LocalHost::new()),
        ssh: Arc::new(RusshConnector::default()),
        prober: Arc::new(PingProber::default()),
        clock: Arc::new(TokioClock),
    };
    let options = ProvisionOptions {
        image: cli.image,
        image_server_port: cli.image_server_port,
        skip_boot: cli.skip_boot,
    };

    let report = ProvisioningOrchestrator::new(config, hosts, Arc::new(redfish))
        .provision(&node, &options)
        .await?;
    info!("Provisioned {}", report);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!(stage = e.stage(), "{}", e);
        std::process::exit(e.exit_code());
    }
}
