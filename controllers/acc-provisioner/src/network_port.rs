//! Provisioning-host interfaces: cluster port assignment and address discovery.

use crate::config::ExternalPort;
use crate::error::ProvisionError;
use dhcpd_config::{subnet_range, config::HOST_SUBNET_PREFIX};
use host_exec::CommandRunner;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info};

const STAGE: &str = "network-port";

/// Puts the cluster-facing interface on the node's subnet
pub struct NetworkPortPreparer {
    runner: Arc<dyn CommandRunner>,
}

impl NetworkPortPreparer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Flush `api_port` and give it the first address of the /24 around `node_ip`.
    ///
    /// Safe to repeat: the flush removes whatever a previous run assigned.
    pub async fn prepare(&self, api_port: &str, node_ip: Ipv4Addr) -> Result<Ipv4Net, ProvisionError> {
        let (start, _) = subnet_range(node_ip, HOST_SUBNET_PREFIX)
            .map_err(|e| ProvisionError::network_config(STAGE, e))?;
        let address = Ipv4Net::new(start, HOST_SUBNET_PREFIX)
            .map_err(|e| ProvisionError::network_config(STAGE, e))?;

        info!(port = %api_port, address = %address, "Flushing cluster port and assigning address");
        self.run_or_die(&format!("ip addr flush dev {}", api_port)).await?;
        self.run_or_die(&format!("ip addr add {} dev {}", address, api_port))
            .await?;
        Ok(address)
    }

    async fn run_or_die(&self, command: &str) -> Result<(), ProvisionError> {
        self.runner
            .run_or_die(command)
            .await
            .map(|_| ())
            .map_err(|e| ProvisionError::network_config(STAGE, e))
    }
}

/// Interface name for the external port, following the default route for `auto`.
pub async fn resolve_external_port(
    runner: &dyn CommandRunner,
    port: &ExternalPort,
) -> Result<String, ProvisionError> {
    let ExternalPort::Interface(name) = port else {
        let output = runner
            .run_or_die("ip -4 route show default")
            .await
            .map_err(|e| ProvisionError::network_config(STAGE, e))?;
        let dev = parse_default_route_dev(&output.stdout).ok_or_else(|| {
            ProvisionError::network_config(STAGE, "no default route to derive the external port from")
        })?;
        debug!("External port auto-detected as {}", dev);
        return Ok(dev);
    };
    Ok(name.clone())
}

/// First IPv4 address on `iface`
pub async fn host_ipv4(runner: &dyn CommandRunner, iface: &str) -> Result<Ipv4Addr, ProvisionError> {
    let output = runner
        .run_or_die(&format!("ip -4 -o addr show dev {}", iface))
        .await
        .map_err(|e| ProvisionError::network_config(STAGE, e))?;
    parse_first_inet(&output.stdout)
        .ok_or_else(|| ProvisionError::network_config(STAGE, format!("{} has no IPv4 address", iface)))
}

fn parse_default_route_dev(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find(|l| l.starts_with("default"))?
        .split_whitespace()
        .skip_while(|&s| s != "dev")
        .nth(1)
        .map(str::to_string)
}

fn parse_first_inet(stdout: &str) -> Option<Ipv4Addr> {
    stdout.lines().find_map(|line| {
        line.split_whitespace()
            .skip_while(|&s| s != "inet")
            .nth(1)?
            .split('/')
            .next()?
            .parse()
            .ok()
    })
}
