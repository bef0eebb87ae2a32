//! Boot the IMC from the installation image and wait out the install.

use crate::clock::Clock;
use crate::config::{NodeDescriptor, TimingConfig};
use crate::error::ProvisionError;
use boot_media::ResolvedImageAddress;
use host_exec::SshConnector;
use redfish_client::{RedfishClientTrait, RedfishError};
use std::sync::Arc;
use tracing::{info, warn};

const STAGE: &str = "remote-boot";

/// One boot operation: the image being booted and how many requests were made.
#[derive(Debug)]
pub struct BootSession<'a> {
    pub address: &'a ResolvedImageAddress,
    pub attempts: u32,
    pub last_error: Option<RedfishError>,
}

pub struct RemoteBootDriver {
    ssh: Arc<dyn SshConnector>,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
}

impl RemoteBootDriver {
    pub fn new(ssh: Arc<dyn SshConnector>, clock: Arc<dyn Clock>, timing: TimingConfig) -> Self {
        Self { ssh, clock, timing }
    }

    /// Request the boot (retrying), confirm the IMC answers, then wait for the install.
    ///
    /// Returns the number of boot requests made.
    pub async fn boot(
        &self,
        redfish: &dyn RedfishClientTrait,
        node: &NodeDescriptor,
        address: &ResolvedImageAddress,
    ) -> Result<u32, ProvisionError> {
        let session = self.request_boot(redfish, node, address).await?;

        // The controller must be reachable right after accepting the request.
        let imc = self
            .ssh
            .connect(&node.bmc, &node.bmc_user, &node.bmc_password)
            .await
            .map_err(|e| ProvisionError::remote_boot(STAGE, format!("IMC {} unreachable after boot: {}", node.bmc, e)))?;
        drop(imc);

        info!(
            node = %node.name,
            settle = ?self.timing.install_settle(),
            "Waiting for the installation to finish"
        );
        self.clock.sleep(self.timing.install_settle()).await;
        info!(node = %node.name, bmc = %node.bmc, "Finished booting IMC");
        Ok(session.attempts)
    }

    async fn request_boot<'a>(
        &self,
        redfish: &dyn RedfishClientTrait,
        node: &NodeDescriptor,
        address: &'a ResolvedImageAddress,
    ) -> Result<BootSession<'a>, ProvisionError> {
        let mut session = BootSession {
            address,
            attempts: 0,
            last_error: None,
        };
        let retries = self.timing.boot_retries.max(1);

        while session.attempts < retries {
            session.attempts += 1;
            info!(
                node = %node.name,
                bmc = %redfish.base_url(),
                attempt = session.attempts,
                "Booting from {}",
                session.address
            );
            match redfish.boot_from_image(session.address.as_str()).await {
                Ok(()) => return Ok(session),
                Err(e) => {
                    warn!(attempt = session.attempts, "Boot request failed: {}", e);
                    session.last_error = Some(e);
                }
            }
            if session.attempts < retries {
                self.clock.sleep(self.timing.boot_retry_delay()).await;
            }
        }

        Err(ProvisionError::remote_boot(
            STAGE,
            format!(
                "boot of {} from {} failed after {} attempts: {}",
                node.bmc,
                session.address,
                session.attempts,
                session
                    .last_error
                    .map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
            ),
        ))
    }
}
