//! Reachability probing

use crate::local::LocalHost;
use crate::runner::CommandRunner;
use std::net::IpAddr;
use tracing::debug;

/// Checks whether a host answers on the network
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// One probe; `true` when the host answered
    async fn probe(&self, addr: IpAddr) -> bool;
}

/// Probes with a single `ping` from the provisioning host
#[derive(Debug, Clone)]
pub struct PingProber {
    runner: LocalHost,
    timeout_secs: u32,
}

impl Default for PingProber {
    fn default() -> Self {
        Self {
            runner: LocalHost::new(),
            timeout_secs: 2,
        }
    }
}

impl PingProber {
    fn command(&self, addr: IpAddr) -> String {
        format!("ping -c 1 -W {} {}", self.timeout_secs, addr)
    }
}

#[async_trait::async_trait]
impl Prober for PingProber {
    async fn probe(&self, addr: IpAddr) -> bool {
        match self.runner.run(&self.command(addr)).await {
            Ok(output) => output.success(),
            Err(e) => {
                debug!(addr = %addr, "ping could not run: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_ping_command_format() {
        let prober = PingProber::default();
        let cmd = prober.command(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)));
        assert_eq!(cmd, "ping -c 1 -W 2 192.168.1.50");
    }
}
