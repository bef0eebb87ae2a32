//! Redfish Client
//!
//! Client for the Redfish management API exposed by a card's management
//! controller (IMC). Only the operations needed to boot the controller from a
//! network-hosted installation image are implemented:
//!
//! - discover the computer system and a CD/DVD virtual-media slot
//! - eject and insert virtual media
//! - set a one-time boot override
//! - reset the system
//!
//! # Example
//!
//! ```no_run
//! use redfish_client::{RedfishClient, RedfishClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedfishClient::new(
//!     "https://10.0.0.5".to_string(),
//!     "root".to_string(),
//!     "calvin".to_string(),
//! )?;
//!
//! client.boot_from_image("http://10.0.0.1:8000/rhel.iso").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod redfish_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::RedfishClient;
pub use error::RedfishError;
pub use models::*;
pub use redfish_trait::RedfishClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockRedfishClient;
