//! Cluster configuration
//!
//! Loaded once from YAML at startup; everything downstream receives the
//! parsed values by reference.

use crate::error::ProvisionError;
use anyhow::Context;
use mac_address::MacAddress;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const STAGE: &str = "config";

/// Top-level cluster configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,

    /// Interface whose address the controller uses to fetch a served image
    #[serde(default)]
    pub external_port: ExternalPort,

    /// Cluster-facing interface on the ACC's isolated subnet
    pub network_api_port: String,

    /// Default installation image (URL or local path)
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub dhcpd: DhcpdSettings,

    #[serde(default = "default_image_server_port")]
    pub image_server_port: u16,

    #[serde(default)]
    pub acc_credentials: Credentials,

    #[serde(default)]
    pub timing: TimingConfig,

    pub nodes: Vec<NodeDescriptor>,
}

fn default_image_server_port() -> u16 {
    8000
}

/// `auto` (interface of the default route) or an explicit interface name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExternalPort {
    #[default]
    Auto,
    Interface(String),
}

impl From<String> for ExternalPort {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Interface(value.trim().to_string())
        }
    }
}

/// A provisionable IPU
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDescriptor {
    pub name: String,
    /// ACC MAC on the cluster subnet
    #[serde(deserialize_with = "deserialize_mac")]
    pub mac: MacAddress,
    /// Address reserved for the ACC
    pub ip: Ipv4Addr,
    /// IMC address
    pub bmc: String,
    pub bmc_user: String,
    pub bmc_password: String,
    /// Redfish endpoint, when it is not `https://<bmc>`
    #[serde(default)]
    pub redfish_url: Option<String>,
}

fn deserialize_mac<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MacAddress, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse().map_err(serde::de::Error::custom)
}

impl NodeDescriptor {
    pub fn redfish_url(&self) -> String {
        self.redfish_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.bmc))
    }
}

/// Username and password for an SSH login
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "redhat".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DhcpdSettings {
    pub config_path: PathBuf,
    pub backup_path: PathBuf,
    /// systemd unit name
    pub service: String,
}

impl Default for DhcpdSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/dhcp/dhcpd.conf"),
            backup_path: PathBuf::from("/etc/dhcp/dhcpd.conf.acc-provisioner.bak"),
            service: "dhcpd".to_string(),
        }
    }
}

/// Retry bounds and waits, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub boot_retries: u32,
    pub boot_retry_delay_secs: u64,
    /// Wait after the boot request for the unattended install to finish.
    /// The controller exposes no completion signal, so this is a fixed wait.
    pub install_settle_secs: u64,
    pub port_settle_secs: u64,
    pub probe_retries: u32,
    pub probe_initial_delay_secs: u64,
    pub probe_max_delay_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            boot_retries: 5,
            boot_retry_delay_secs: 15,
            install_settle_secs: 25 * 60,
            port_settle_secs: 30,
            probe_retries: 30,
            probe_initial_delay_secs: 5,
            probe_max_delay_secs: 60,
        }
    }
}

impl TimingConfig {
    pub fn boot_retry_delay(&self) -> Duration {
        Duration::from_secs(self.boot_retry_delay_secs)
    }

    pub fn install_settle(&self) -> Duration {
        Duration::from_secs(self.install_settle_secs)
    }

    pub fn port_settle(&self) -> Duration {
        Duration::from_secs(self.port_settle_secs)
    }

    pub fn probe_initial_delay(&self) -> Duration {
        Duration::from_secs(self.probe_initial_delay_secs)
    }

    pub fn probe_max_delay(&self) -> Duration {
        Duration::from_secs(self.probe_max_delay_secs)
    }
}

/// The two host interfaces a run touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNetworkContext {
    pub external_port: ExternalPort,
    pub network_api_port: String,
}

impl ClusterConfig {
    /// Read and parse a YAML configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cluster config {}", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("Failed to parse cluster config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Checks serde cannot express.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.nodes.is_empty() {
            return Err(ProvisionError::validation(
                STAGE,
                format!("cluster {} has no nodes", self.name),
            ));
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(ProvisionError::validation(
                    STAGE,
                    format!("duplicate node name {}", node.name),
                ));
            }
        }
        if self.network_api_port.trim().is_empty() {
            return Err(ProvisionError::validation(
                STAGE,
                "network_api_port must not be empty",
            ));
        }
        Ok(())
    }

    /// The node named `name`, or the only node when no name is given.
    pub fn select_node(&self, name: Option<&str>) -> Result<&NodeDescriptor, ProvisionError> {
        match name {
            Some(name) => self
                .nodes
                .iter()
                .find(|n| n.name == name)
                .ok_or_else(|| ProvisionError::validation(STAGE, format!("no node named {}", name))),
            None => match self.nodes.as_slice() {
                [only] => Ok(only),
                _ => Err(ProvisionError::validation(
                    STAGE,
                    format!(
                        "cluster {} has {} nodes; select one with --node",
                        self.name,
                        self.nodes.len()
                    ),
                )),
            },
        }
    }

    pub fn network_context(&self) -> ClusterNetworkContext {
        ClusterNetworkContext {
            external_port: self.external_port.clone(),
            network_api_port: self.network_api_port.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "
name: ipu-cluster
network_api_port: eno2
nodes:
  - name: ipu1
    mac: aa:bb:cc:dd:ee:ff
    ip: 192.168.1.50
    bmc: 10.0.0.5
    bmc_user: root
    bmc_password: calvin
";

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.external_port, ExternalPort::Auto);
        assert_eq!(config.image_server_port, 8000);
        assert_eq!(config.acc_credentials, Credentials::default());
        assert_eq!(config.dhcpd.service, "dhcpd");
        assert_eq!(config.timing.boot_retries, 5);
        assert_eq!(config.timing.install_settle(), Duration::from_secs(1500));
        assert_eq!(config.nodes[0].redfish_url(), "https://10.0.0.5");
        assert_eq!(config.nodes[0].mac, "aa:bb:cc:dd:ee:ff".parse::<MacAddress>().unwrap());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let yaml = "
name: ipu-cluster
external_port: eno1
network_api_port: eno2
image: https://mirror.lab/rhel.iso
dhcpd:
  config_path: /tmp/dhcpd.conf
image_server_port: 8080
acc_credentials: { user: core, password: secret }
timing:
  probe_retries: 3
nodes:
  - name: ipu1
    mac: aa:bb:cc:dd:ee:ff
    ip: 192.168.1.50
    bmc: 10.0.0.5
    bmc_user: root
    bmc_password: calvin
    redfish_url: https://10.0.0.5:8443
";
        let config = ClusterConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.external_port, ExternalPort::Interface("eno1".to_string()));
        assert_eq!(config.dhcpd.config_path, PathBuf::from("/tmp/dhcpd.conf"));
        assert_eq!(config.dhcpd.service, "dhcpd");
        assert_eq!(config.timing.probe_retries, 3);
        assert_eq!(config.timing.boot_retries, 5);
        assert_eq!(config.acc_credentials.user, "core");
        assert_eq!(config.nodes[0].redfish_url(), "https://10.0.0.5:8443");
    }

    #[test]
    fn test_rejects_bad_mac_and_ipv6() {
        let bad_mac = MINIMAL.replace("aa:bb:cc:dd:ee:ff", "not-a-mac");
        assert!(ClusterConfig::from_yaml(&bad_mac).is_err());

        let ipv6 = MINIMAL.replace("192.168.1.50", "fd00::50");
        assert!(ClusterConfig::from_yaml(&ipv6).is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut config = ClusterConfig::from_yaml(MINIMAL).unwrap();
        config.nodes.push(config.nodes[0].clone());

        assert!(matches!(
            config.validate(),
            Err(ProvisionError::Validation { .. })
        ));
    }

    #[test]
    fn test_select_node() {
        let mut config = ClusterConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.select_node(None).unwrap().name, "ipu1");
        assert!(config.select_node(Some("ipu9")).is_err());

        let mut second = config.nodes[0].clone();
        second.name = "ipu2".to_string();
        config.nodes.push(second);

        assert!(config.select_node(None).is_err());
        assert_eq!(config.select_node(Some("ipu2")).unwrap().name, "ipu2");
    }

    #[test]
    fn test_load_reports_path() {
        let err = ClusterConfig::load(Path::new("/nonexistent/cluster.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/cluster.yaml"));
    }
}
