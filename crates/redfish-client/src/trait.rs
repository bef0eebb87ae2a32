//! RedfishClient trait for mocking
//!
//! The provisioning flow only depends on this trait, so tests can swap in
//! `MockRedfishClient` instead of talking to real hardware.

use crate::error::RedfishError;

/// Trait for the Redfish operations used by the provisioning flow
#[async_trait::async_trait]
pub trait RedfishClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Perform a single boot-from-image attempt.
    ///
    /// Inserts `image_url` as virtual media, sets a one-time boot override to
    /// the virtual CD and force-restarts the system. Retrying is left to the
    /// caller.
    async fn boot_from_image(&self, image_url: &str) -> Result<(), RedfishError>;
}
