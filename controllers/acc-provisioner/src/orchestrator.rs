//! The provisioning pipeline
//!
//! Runs the stages strictly in order, each a prerequisite for the next:
//!
//! 1. resolve the image reference (validation only, no side effects)
//! 2. stop dhcpd so the installer does not get a lease
//! 3. serve a local image over HTTP if needed
//! 4. boot the IMC from the image and wait for the install
//! 5. put the cluster port on the node's subnet
//! 6. write the DHCP reservation and restart dhcpd
//! 7. reboot the IMC and open the first session into the ACC
//!
//! Nothing is rolled back on failure. Every stage after the boot is safe to
//! repeat, which is what `skip_boot` relies on.

use crate::clock::Clock;
use crate::config::{ClusterConfig, ClusterNetworkContext, NodeDescriptor};
use crate::connectivity::{ConnectivityEstablisher, ConnectivityState};
use crate::dhcp_lease::DhcpLeaseManager;
use crate::error::ProvisionError;
use crate::network_port::{NetworkPortPreparer, host_ipv4, resolve_external_port};
use crate::remote_boot::RemoteBootDriver;
use boot_media::{EphemeralImageServer, ImageReference, LocalImage, ResolvedImageAddress};
use host_exec::{CommandRunner, Prober, SshConnector};
use ipnet::Ipv4Net;
use redfish_client::RedfishClientTrait;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const STAGE: &str = "image-source";

/// Side-effecting services the pipeline runs against
#[derive(Clone)]
pub struct HostServices {
    /// Commands on the provisioning host
    pub local: Arc<dyn CommandRunner>,
    pub ssh: Arc<dyn SshConnector>,
    pub prober: Arc<dyn Prober>,
    pub clock: Arc<dyn Clock>,
}

/// Per-run choices from the command line
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Overrides the configured image
    pub image: Option<String>,
    /// Overrides the configured image server port
    pub image_server_port: Option<u16>,
    /// Start at the cluster port stage
    pub skip_boot: bool,
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub node: String,
    /// `None` when the boot was skipped
    pub image_address: Option<ResolvedImageAddress>,
    pub port_address: Ipv4Net,
    pub backup_taken: bool,
    pub final_state: ConnectivityState,
    pub elapsed: Duration,
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: image {}, cluster port {}, dhcpd backup {}, {} after {:?}",
            self.node,
            self.image_address
                .as_ref()
                .map_or_else(|| "(boot skipped)".to_string(), ToString::to_string),
            self.port_address,
            if self.backup_taken { "taken" } else { "not needed" },
            self.final_state,
            self.elapsed
        )
    }
}

/// How the controller will reach the image, decided before anything is touched
enum ImagePlan {
    Remote(ResolvedImageAddress),
    Serve(LocalImage),
}

pub struct ProvisioningOrchestrator {
    config: ClusterConfig,
    hosts: HostServices,
    redfish: Arc<dyn RedfishClientTrait>,
}

impl ProvisioningOrchestrator {
    pub fn new(config: ClusterConfig, hosts: HostServices, redfish: Arc<dyn RedfishClientTrait>) -> Self {
        Self {
            config,
            hosts,
            redfish,
        }
    }

    pub async fn provision(
        &self,
        node: &NodeDescriptor,
        options: &ProvisionOptions,
    ) -> Result<ProvisionReport, ProvisionError> {
        let started = Instant::now();
        let network = self.config.network_context();
        let leases = DhcpLeaseManager::new(Arc::clone(&self.hosts.local), &self.config.dhcpd);
        info!(node = %node.name, cluster = %self.config.name, "Provisioning");

        let image_address = if options.skip_boot {
            info!(node = %node.name, "Skipping remote boot");
            None
        } else {
            let plan = self.plan_image(options)?;
            leases.stop_service().await;
            Some(self.boot(node, &network, plan, options).await?)
        };

        let port_address = NetworkPortPreparer::new(Arc::clone(&self.hosts.local))
            .prepare(&network.network_api_port, node.ip)
            .await?;

        let lease = leases.register(node).await?;

        let connectivity = ConnectivityEstablisher::new(
            Arc::clone(&self.hosts.ssh),
            Arc::clone(&self.hosts.prober),
            Arc::clone(&self.hosts.clock),
            self.config.timing.clone(),
            self.config.acc_credentials.clone(),
        )
        .establish(node)
        .await?;

        Ok(ProvisionReport {
            node: node.name.clone(),
            image_address,
            port_address,
            backup_taken: lease.backup_taken,
            final_state: connectivity.final_state,
            elapsed: started.elapsed(),
        })
    }

    fn plan_image(&self, options: &ProvisionOptions) -> Result<ImagePlan, ProvisionError> {
        let raw = options
            .image
            .as_deref()
            .or(self.config.image.as_deref())
            .ok_or_else(|| ProvisionError::validation(STAGE, "no installation image given"))?;

        match ImageReference::parse(raw).map_err(|e| ProvisionError::validation(STAGE, e))? {
            ImageReference::RemoteAddress(url) => {
                debug!("Booting from image served at {}", url);
                Ok(ImagePlan::Remote(ResolvedImageAddress::remote(url)))
            }
            ImageReference::LocalPath(path) => {
                debug!("Booting from local image {}", path.display());
                let local =
                    LocalImage::resolve(&path).map_err(|e| ProvisionError::validation(STAGE, e))?;
                Ok(ImagePlan::Serve(local))
            }
        }
    }

    async fn boot(
        &self,
        node: &NodeDescriptor,
        network: &ClusterNetworkContext,
        plan: ImagePlan,
        options: &ProvisionOptions,
    ) -> Result<ResolvedImageAddress, ProvisionError> {
        let driver = RemoteBootDriver::new(
            Arc::clone(&self.hosts.ssh),
            Arc::clone(&self.hosts.clock),
            self.config.timing.clone(),
        );

        let local = match plan {
            ImagePlan::Remote(address) => {
                driver.boot(self.redfish.as_ref(), node, &address).await?;
                return Ok(address);
            }
            ImagePlan::Serve(local) => local,
        };

        let external_port =
            resolve_external_port(self.hosts.local.as_ref(), &network.external_port).await?;
        let host_ip = host_ipv4(self.hosts.local.as_ref(), &external_port).await?;
        let port = options
            .image_server_port
            .unwrap_or(self.config.image_server_port);

        // The server stays up through the install wait: the installer keeps
        // reading from the image after the boot request returns.
        let server = EphemeralImageServer::start(&local.dir, port)
            .await
            .map_err(|e| ProvisionError::remote_boot(STAGE, e))?;
        let result = match server.image_address(IpAddr::V4(host_ip), &local.file_name) {
            Ok(address) => driver
                .boot(self.redfish.as_ref(), node, &address)
                .await
                .map(|_| address),
            Err(e) => Err(ProvisionError::remote_boot(STAGE, e)),
        };
        server.shutdown().await;
        result
    }
}
