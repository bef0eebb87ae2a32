//! Recording mocks for unit testing
//!
//! `MockRunner` answers commands from a table of prefix-matched responses and
//! records every command it was asked to run. `MockSshConnector` hands out
//! per-host `MockRunner`s and can refuse chosen hosts. `MockProber` becomes
//! reachable after a configurable number of probes.

use crate::error::ExecError;
use crate::output::CommandOutput;
use crate::probe::Prober;
use crate::runner::CommandRunner;
use crate::ssh::SshConnector;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Mock command runner
#[derive(Debug, Clone)]
pub struct MockRunner {
    host: String,
    responses: Arc<Mutex<Vec<(String, CommandOutput)>>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl MockRunner {
    /// Create a runner that answers every command with success and empty output
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer commands starting with `prefix` with `output`.
    ///
    /// Later registrations win over earlier ones for the same prefix.
    pub fn respond(&self, prefix: impl Into<String>, output: CommandOutput) -> &Self {
        self.responses.lock().unwrap().push((prefix.into(), output));
        self
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockRunner {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.commands.lock().unwrap().push(command.to_string());
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .rev()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Mock SSH connector
#[derive(Debug, Clone, Default)]
pub struct MockSshConnector {
    sessions: Arc<Mutex<HashMap<String, MockRunner>>>,
    refused: Arc<Mutex<Vec<String>>>,
    connects: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockSshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject authentication for `host`
    pub fn refuse(&self, host: impl Into<String>) -> &Self {
        self.refused.lock().unwrap().push(host.into());
        self
    }

    /// The runner used for sessions to `host` (created on first use)
    pub fn session(&self, host: &str) -> MockRunner {
        self.sessions
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_insert_with(|| MockRunner::new(host))
            .clone()
    }

    /// `(host, user, password)` of every connection attempt
    pub fn connects(&self) -> Vec<(String, String, String)> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SshConnector for MockSshConnector {
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CommandRunner>, ExecError> {
        self.connects.lock().unwrap().push((
            host.to_string(),
            user.to_string(),
            password.to_string(),
        ));
        if self.refused.lock().unwrap().iter().any(|h| h == host) {
            return Err(ExecError::Authentication {
                host: host.to_string(),
                user: user.to_string(),
            });
        }
        Ok(Box::new(self.session(host)))
    }
}

/// Mock reachability prober
#[derive(Debug, Clone)]
pub struct MockProber {
    reachable_after: Option<u32>,
    probes: Arc<Mutex<Vec<IpAddr>>>,
}

impl MockProber {
    /// Host answers on the first probe
    pub fn reachable() -> Self {
        Self::reachable_after(0)
    }

    /// Host answers after `failures` unanswered probes
    pub fn reachable_after(failures: u32) -> Self {
        Self {
            reachable_after: Some(failures),
            probes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Host never answers
    pub fn unreachable() -> Self {
        Self {
            reachable_after: None,
            probes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Prober for MockProber {
    async fn probe(&self, addr: IpAddr) -> bool {
        let mut probes = self.probes.lock().unwrap();
        let previous = probes.len();
        probes.push(addr);
        match self.reachable_after {
            Some(failures) => previous >= failures as usize,
            None => false,
        }
    }
}
