//! Host command execution
//!
//! Uniform command execution against the provisioning host (`LocalHost`) and
//! remote hosts reached over SSH (`SshSession`), plus an ICMP reachability
//! probe. Everything the provisioner runs goes through `CommandRunner`, so
//! tests can substitute the recording mocks from the `test-util` feature.

pub mod error;
pub mod local;
pub mod output;
pub mod probe;
pub mod runner;
pub mod ssh;
#[cfg(feature = "test-util")]
pub mod mock;

pub use error::ExecError;
pub use local::LocalHost;
pub use output::CommandOutput;
pub use probe::{PingProber, Prober};
pub use runner::CommandRunner;
pub use ssh::{RusshConnector, SshConnector, SshSession};
#[cfg(feature = "test-util")]
pub use mock::{MockProber, MockRunner, MockSshConnector};
