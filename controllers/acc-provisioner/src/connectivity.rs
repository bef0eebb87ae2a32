//! First session into the freshly installed ACC.
//!
//! The ACC's link to the cluster port only comes up while the IMC boots, so
//! the IMC is rebooted first and the ACC is then polled until it answers:
//!
//! ```text
//! Start -> WaitingForPort -> PingingAcc{1..n} -> ConnectingAcc -> Established
//!                                  |                   |
//!                                  +-----> Failed <----+
//! ```

use crate::backoff::FibonacciBackoff;
use crate::clock::Clock;
use crate::config::{Credentials, NodeDescriptor, TimingConfig};
use crate::error::ProvisionError;
use host_exec::{Prober, SshConnector};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

const STAGE: &str = "connectivity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Start,
    WaitingForPort,
    PingingAcc { attempt: u32 },
    ConnectingAcc,
    Established,
    Failed,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::WaitingForPort => write!(f, "WAITING_FOR_PORT"),
            Self::PingingAcc { attempt } => write!(f, "PINGING_ACC({})", attempt),
            Self::ConnectingAcc => write!(f, "CONNECTING_ACC"),
            Self::Established => write!(f, "ESTABLISHED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Successful run of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityOutcome {
    pub final_state: ConnectivityState,
    /// Every state entered, in order
    pub transitions: Vec<ConnectivityState>,
}

pub struct ConnectivityEstablisher {
    ssh: Arc<dyn SshConnector>,
    prober: Arc<dyn Prober>,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
    acc_credentials: Credentials,
}

impl ConnectivityEstablisher {
    pub fn new(
        ssh: Arc<dyn SshConnector>,
        prober: Arc<dyn Prober>,
        clock: Arc<dyn Clock>,
        timing: TimingConfig,
        acc_credentials: Credentials,
    ) -> Self {
        Self {
            ssh,
            prober,
            clock,
            timing,
            acc_credentials,
        }
    }

    pub async fn establish(&self, node: &NodeDescriptor) -> Result<ConnectivityOutcome, ProvisionError> {
        info!("Establishing connectivity to {}", node.name);
        let acc = IpAddr::V4(node.ip);
        let mut backoff = FibonacciBackoff::new(
            self.timing.probe_initial_delay(),
            self.timing.probe_max_delay(),
        );
        let mut transitions = Vec::new();
        let mut failure: Option<String> = None;
        let mut state = ConnectivityState::Start;

        loop {
            info!(node = %node.name, state = %state, "Connectivity state");
            transitions.push(state);

            state = match state {
                ConnectivityState::Start => {
                    self.reboot_imc(node).await;
                    ConnectivityState::WaitingForPort
                }
                ConnectivityState::WaitingForPort => {
                    self.clock.sleep(self.timing.port_settle()).await;
                    ConnectivityState::PingingAcc { attempt: 1 }
                }
                ConnectivityState::PingingAcc { attempt } => {
                    if self.prober.probe(acc).await {
                        ConnectivityState::ConnectingAcc
                    } else if attempt >= self.timing.probe_retries {
                        failure = Some(format!(
                            "{} at {} unreachable after {} probes",
                            node.name, acc, attempt
                        ));
                        ConnectivityState::Failed
                    } else {
                        let delay = backoff.next_backoff();
                        warn!(node = %node.name, attempt, "ACC {} not answering, retrying in {:?}", acc, delay);
                        self.clock.sleep(delay).await;
                        ConnectivityState::PingingAcc {
                            attempt: attempt + 1,
                        }
                    }
                }
                ConnectivityState::ConnectingAcc => {
                    let Credentials { user, password } = &self.acc_credentials;
                    match self.ssh.connect(&acc.to_string(), user, password).await {
                        Ok(_session) => ConnectivityState::Established,
                        Err(e) => {
                            failure = Some(format!("SSH to {} at {} failed: {}", node.name, acc, e));
                            ConnectivityState::Failed
                        }
                    }
                }
                ConnectivityState::Established => {
                    info!("{} connectivity established", node.name);
                    return Ok(ConnectivityOutcome {
                        final_state: state,
                        transitions,
                    });
                }
                ConnectivityState::Failed => {
                    let message = failure.unwrap_or_else(|| "connectivity failed".to_string());
                    warn!(node = %node.name, "{}", message);
                    return Err(ProvisionError::connectivity(STAGE, message));
                }
            };
        }
    }

    /// Reboot the IMC so the ACC's port comes up. Best effort: the reboot
    /// usually tears down the session before an exit status arrives.
    async fn reboot_imc(&self, node: &NodeDescriptor) {
        info!(bmc = %node.bmc, "Rebooting IMC to trigger ACC reboot");
        let imc = match self
            .ssh
            .connect(&node.bmc, &node.bmc_user, &node.bmc_password)
            .await
        {
            Ok(imc) => imc,
            Err(e) => {
                warn!(bmc = %node.bmc, "Could not open IMC session for reboot (continuing): {}", e);
                return;
            }
        };
        match imc.run("systemctl reboot").await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(
                bmc = %node.bmc,
                "systemctl reboot exited with {} (continuing): {}",
                output.exit_code,
                output.stderr.trim()
            ),
            Err(e) => warn!(bmc = %node.bmc, "systemctl reboot failed (continuing): {}", e),
        }
    }
}
