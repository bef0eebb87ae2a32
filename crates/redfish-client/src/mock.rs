//! Mock RedfishClient for unit testing
//!
//! Records every boot attempt and fails a configurable number of times, so
//! retry bounds can be asserted without hardware. With `fetch_images` it also
//! downloads the image like a real controller would, which proves the image
//! is reachable while the boot request is in flight.

use crate::error::RedfishError;
use crate::redfish_trait::RedfishClientTrait;
use std::sync::{Arc, Mutex};

/// How the mock answers boot requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Never,
    Times(u32),
    Always,
}

/// Mock RedfishClient for testing
#[derive(Debug, Clone)]
pub struct MockRedfishClient {
    base_url: String,
    failure_mode: Arc<Mutex<FailureMode>>,
    boot_calls: Arc<Mutex<Vec<String>>>,
    fetch_images: bool,
    fetched: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockRedfishClient {
    /// Create a mock whose boot requests always succeed
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            failure_mode: Arc::new(Mutex::new(FailureMode::Never)),
            boot_calls: Arc::new(Mutex::new(Vec::new())),
            fetch_images: false,
            fetched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// GET the image URL during each boot request; a failed download fails the boot
    pub fn fetch_images(mut self) -> Self {
        self.fetch_images = true;
        self
    }

    /// Bodies downloaded by `fetch_images`, in call order
    pub fn fetched_images(&self) -> Vec<Vec<u8>> {
        self.fetched.lock().unwrap().clone()
    }

    /// Every boot request fails
    pub fn fail_always(self) -> Self {
        *self.failure_mode.lock().unwrap() = FailureMode::Always;
        self
    }

    /// The first `n` boot requests fail, later ones succeed
    pub fn fail_times(self, n: u32) -> Self {
        *self.failure_mode.lock().unwrap() = FailureMode::Times(n);
        self
    }

    /// Image URLs passed to `boot_from_image`, in call order
    pub fn boot_calls(&self) -> Vec<String> {
        self.boot_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RedfishClientTrait for MockRedfishClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn boot_from_image(&self, image_url: &str) -> Result<(), RedfishError> {
        self.boot_calls.lock().unwrap().push(image_url.to_string());

        if self.fetch_images {
            let response = reqwest::get(image_url).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RedfishError::Api(format!("GET {} failed: {}", image_url, status)));
            }
            let body = response.bytes().await?;
            self.fetched.lock().unwrap().push(body.to_vec());
        }

        let mut mode = self.failure_mode.lock().unwrap();
        match *mode {
            FailureMode::Never => Ok(()),
            FailureMode::Always => Err(RedfishError::Api(
                "POST /redfish/v1/Systems/1/Actions/ComputerSystem.Reset failed: 500".to_string(),
            )),
            FailureMode::Times(0) => {
                *mode = FailureMode::Never;
                Ok(())
            }
            FailureMode::Times(n) => {
                *mode = FailureMode::Times(n - 1);
                Err(RedfishError::Api(format!("mock failure, {} left", n - 1)))
            }
        }
    }
}
