//! Test utilities for the provisioning stages
//!
//! Builders for nodes and cluster configs, a clock that records instead of
//! sleeping, and a harness wiring every mock into an orchestrator.

#[cfg(test)]
use crate::clock::Clock;
#[cfg(test)]
use crate::config::{ClusterConfig, DhcpdSettings, ExternalPort, NodeDescriptor, TimingConfig};
#[cfg(test)]
use crate::orchestrator::{HostServices, ProvisioningOrchestrator};
#[cfg(test)]
use host_exec::{CommandOutput, MockProber, MockRunner, MockSshConnector};
#[cfg(test)]
use redfish_client::MockRedfishClient;
#[cfg(test)]
use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;
#[cfg(test)]
use tempfile::TempDir;

/// Clock that records requested sleeps and returns immediately
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

#[cfg(test)]
impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// The node from the end-to-end scenario
#[cfg(test)]
pub fn test_node() -> NodeDescriptor {
    NodeDescriptor {
        name: "ipu1".to_string(),
        mac: "aa:bb:cc:dd:ee:ff".parse().unwrap(),
        ip: "192.168.1.50".parse().unwrap(),
        bmc: "10.0.0.5".to_string(),
        bmc_user: "root".to_string(),
        bmc_password: "calvin".to_string(),
        redfish_url: None,
    }
}

/// Single-node cluster whose dhcpd files live under `dir`
#[cfg(test)]
pub fn test_cluster_config(dir: &TempDir) -> ClusterConfig {
    ClusterConfig {
        name: "ipu-cluster".to_string(),
        external_port: ExternalPort::Auto,
        network_api_port: "eno2".to_string(),
        image: None,
        dhcpd: DhcpdSettings {
            config_path: dir.path().join("dhcpd.conf"),
            backup_path: dir.path().join("dhcpd.conf.bak"),
            service: "dhcpd".to_string(),
        },
        image_server_port: 0,
        acc_credentials: Default::default(),
        timing: TimingConfig::default(),
        nodes: vec![test_node()],
    }
}

/// Every collaborator mocked, with handles kept for assertions
#[cfg(test)]
pub struct Harness {
    pub dir: TempDir,
    pub local: MockRunner,
    pub ssh: MockSshConnector,
    pub prober: MockProber,
    pub clock: RecordingClock,
    pub redfish: MockRedfishClient,
}

#[cfg(test)]
impl Harness {
    /// Provisioning host with a default route on eno1 at 10.0.0.10
    pub fn new() -> Self {
        let local = MockRunner::new("localhost");
        local
            .respond(
                "ip -4 route show default",
                CommandOutput::ok("default via 10.0.0.1 dev eno1 proto static metric 100\n"),
            )
            .respond(
                "ip -4 -o addr show dev eno1",
                CommandOutput::ok("2: eno1    inet 10.0.0.10/24 brd 10.0.0.255 scope global eno1\n"),
            );
        Self {
            dir: TempDir::new().unwrap(),
            local,
            ssh: MockSshConnector::new(),
            prober: MockProber::reachable(),
            clock: RecordingClock::new(),
            redfish: MockRedfishClient::new("https://10.0.0.5"),
        }
    }

    pub fn with_prober(mut self, prober: MockProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_redfish(mut self, redfish: MockRedfishClient) -> Self {
        self.redfish = redfish;
        self
    }

    pub fn config(&self) -> ClusterConfig {
        test_cluster_config(&self.dir)
    }

    pub fn orchestrator(&self, config: ClusterConfig) -> ProvisioningOrchestrator {
        ProvisioningOrchestrator::new(
            config,
            HostServices {
                local: Arc::new(self.local.clone()),
                ssh: Arc::new(self.ssh.clone()),
                prober: Arc::new(self.prober.clone()),
                clock: Arc::new(self.clock.clone()),
            },
            Arc::new(self.redfish.clone()),
        )
    }

    /// A local image file inside the harness directory
    pub fn image(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"iso").unwrap();
        path
    }

    pub fn dhcpd_conf(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("dhcpd.conf")).unwrap()
    }
}
