//! Redfish REST API client
//!
//! Implements the virtual-media boot flow against a management controller.
//! Based on the DMTF Redfish resource layout: /redfish/v1/Systems and
//! /redfish/v1/Managers.

use crate::error::RedfishError;
use crate::models::*;
use crate::redfish_trait::RedfishClientTrait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

const SYSTEMS_PATH: &str = "/redfish/v1/Systems";
const MANAGERS_PATH: &str = "/redfish/v1/Managers";

/// Redfish REST API client
pub struct RedfishClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for RedfishClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedfishClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RedfishClient {
    /// Create a new Redfish client
    ///
    /// # Arguments
    /// * `base_url` - Controller base URL (e.g., "https://10.0.0.5")
    /// * `username` - Controller user
    /// * `password` - Controller password
    ///
    /// Management controllers ship self-signed certificates, so certificate
    /// validation is disabled for this client.
    pub fn new(base_url: String, username: String, password: String) -> Result<Self, RedfishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, RedfishError> {
        let url = self.build_url(path);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == 401 || status == 403 {
            return Err(RedfishError::Authentication(format!(
                "{} {} rejected credentials for user {}: {}",
                method, path, self.username, status
            )));
        }

        if status == 404 {
            return Err(RedfishError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RedfishError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            )));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RedfishError> {
        let response = self.send(Method::GET, path, None).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            RedfishError::Api(format!(
                "error decoding {}: {} - Response (first 500 chars): {}",
                path,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    async fn first_member(&self, collection_path: &str) -> Result<String, RedfishError> {
        let collection: Collection = self.get_json(collection_path).await?;
        collection
            .members
            .into_iter()
            .next()
            .map(|m| m.odata_id)
            .ok_or_else(|| RedfishError::NotFound(format!("{} has no members", collection_path)))
    }

    /// Get the first (and on a card controller, only) computer system.
    pub async fn get_system(&self) -> Result<ComputerSystem, RedfishError> {
        let system_path = self.first_member(SYSTEMS_PATH).await?;
        self.get_json(&system_path).await
    }

    /// Find a virtual-media slot that accepts CD/DVD images.
    ///
    /// Newer services hang virtual media off the system, older ones off the
    /// manager; the manager is only consulted when the system has no
    /// optical slot.
    pub async fn find_optical_media(
        &self,
        system: &ComputerSystem,
    ) -> Result<VirtualMedia, RedfishError> {
        if let Some(vm) = &system.virtual_media {
            if let Some(media) = self.optical_slot_in(&vm.odata_id).await? {
                return Ok(media);
            }
        }

        match self.first_member(MANAGERS_PATH).await {
            Ok(manager_path) => {
                let manager: Manager = self.get_json(&manager_path).await?;
                if let Some(vm) = manager.virtual_media {
                    if let Some(media) = self.optical_slot_in(&vm.odata_id).await? {
                        return Ok(media);
                    }
                }
            }
            Err(RedfishError::NotFound(e)) => debug!("No manager exposed: {}", e),
            Err(e) => return Err(e),
        }

        Err(RedfishError::NotFound(
            "no virtual media slot accepting CD/DVD".to_string(),
        ))
    }

    async fn optical_slot_in(
        &self,
        collection_path: &str,
    ) -> Result<Option<VirtualMedia>, RedfishError> {
        let collection: Collection = self.get_json(collection_path).await?;
        for member in collection.members {
            let media: VirtualMedia = self.get_json(&member.odata_id).await?;
            if media.accepts_optical_media() {
                debug!("Using virtual media slot {}", media.odata_id);
                return Ok(Some(media));
            }
        }
        Ok(None)
    }

    /// Eject whatever is inserted in the slot.
    pub async fn eject_media(&self, media: &VirtualMedia) -> Result<(), RedfishError> {
        self.send(
            Method::POST,
            &media.eject_target(),
            Some(&serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    /// Insert `image_url` into the slot.
    pub async fn insert_media(
        &self,
        media: &VirtualMedia,
        image_url: &str,
    ) -> Result<(), RedfishError> {
        let body = serde_json::to_value(InsertMediaRequest {
            image: image_url.to_string(),
            inserted: true,
            write_protected: true,
        })?;
        self.send(Method::POST, &media.insert_target(), Some(&body))
            .await?;
        Ok(())
    }

    /// Boot from `target` on the next reset only.
    pub async fn set_one_time_boot(
        &self,
        system: &ComputerSystem,
        target: BootSourceTarget,
    ) -> Result<(), RedfishError> {
        let body = serde_json::json!({
            "Boot": {
                "BootSourceOverrideEnabled": "Once",
                "BootSourceOverrideTarget": target,
            }
        });
        self.send(Method::PATCH, &system.odata_id, Some(&body))
            .await?;
        Ok(())
    }

    /// Reset the system.
    pub async fn reset_system(
        &self,
        system: &ComputerSystem,
        reset_type: ResetType,
    ) -> Result<(), RedfishError> {
        let target = system
            .actions
            .as_ref()
            .and_then(|a| a.reset.as_ref())
            .map_or_else(
                || format!("{}/Actions/ComputerSystem.Reset", system.odata_id),
                |a| a.target.clone(),
            );
        let body = serde_json::json!({ "ResetType": reset_type });
        self.send(Method::POST, &target, Some(&body)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RedfishClientTrait for RedfishClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn boot_from_image(&self, image_url: &str) -> Result<(), RedfishError> {
        let system = self.get_system().await?;
        let media = self.find_optical_media(&system).await?;

        if media.inserted.unwrap_or(false) {
            if let Err(e) = self.eject_media(&media).await {
                warn!("Ejecting {:?} from {} failed (continuing): {}", media.image, media.id, e);
            }
        }

        self.insert_media(&media, image_url).await?;
        self.set_one_time_boot(&system, BootSourceTarget::Cd).await?;
        self.reset_system(&system, ResetType::ForceRestart).await?;

        info!("Requested boot of system {} from {}", system.id, image_url);
        Ok(())
    }
}
