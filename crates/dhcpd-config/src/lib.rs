//! dhcpd configuration management
//!
//! A small model of ISC `dhcpd.conf` sufficient to keep per-node host
//! reservations in a file this tool owns:
//!
//! - `DhcpdConfig`: parsed statements, host reservations deduplicated by MAC
//! - `ManagedConfigFile`: ownership marker handling, one-time backup of a
//!   pre-existing operator file, and locked read-modify-write
//! - `subnet_range`: first/last address of the subnet around a host
//!
//! # Example
//!
//! ```no_run
//! use dhcpd_config::{HostReservation, ManagedConfigFile};
//!
//! # fn example() -> Result<(), dhcpd_config::DhcpConfigError> {
//! let file = ManagedConfigFile::new("/etc/dhcp/dhcpd.conf", "/etc/dhcp/dhcpd.conf.bak");
//! file.claim()?;
//! file.update(|config| {
//!     config.add_host(HostReservation::new(
//!         "ipu1",
//!         "aa:bb:cc:dd:ee:ff".parse().unwrap(),
//!         "192.168.1.50".parse().unwrap(),
//!     ));
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file;
mod parser;
pub mod subnet;

pub use config::{DhcpdConfig, HostReservation, OWNERSHIP_MARKER, Statement, SubnetDeclaration};
pub use error::DhcpConfigError;
pub use file::{ClaimOutcome, ManagedConfigFile};
pub use subnet::subnet_range;
