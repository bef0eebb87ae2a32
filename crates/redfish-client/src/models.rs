//! Redfish resource models
//!
//! Only the fields the boot flow reads are modelled; everything else in the
//! Redfish payloads is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Reference to another Redfish resource (`{"@odata.id": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataId {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// A Redfish resource collection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Collection {
    #[serde(default)]
    pub members: Vec<ODataId>,
}

/// `ComputerSystem` resource (subset)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputerSystem {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    pub id: String,
    #[serde(default)]
    pub virtual_media: Option<ODataId>,
    #[serde(default)]
    pub actions: Option<SystemActions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemActions {
    #[serde(rename = "#ComputerSystem.Reset", default)]
    pub reset: Option<ActionTarget>,
}

/// `Manager` resource (subset)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manager {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    #[serde(default)]
    pub virtual_media: Option<ODataId>,
}

/// `VirtualMedia` resource (subset)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualMedia {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    pub id: String,
    #[serde(default)]
    pub media_types: Vec<String>,
    #[serde(default)]
    pub inserted: Option<bool>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub actions: Option<VirtualMediaActions>,
}

impl VirtualMedia {
    /// Whether this slot accepts optical media (CD or DVD).
    pub fn accepts_optical_media(&self) -> bool {
        self.media_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case("CD") || t.eq_ignore_ascii_case("DVD"))
    }

    /// Target URI of the `InsertMedia` action, falling back to the
    /// conventional path when the service does not advertise it.
    pub fn insert_target(&self) -> String {
        self.actions
            .as_ref()
            .and_then(|a| a.insert_media.as_ref())
            .map_or_else(
                || format!("{}/Actions/VirtualMedia.InsertMedia", self.odata_id),
                |a| a.target.clone(),
            )
    }

    /// Target URI of the `EjectMedia` action.
    pub fn eject_target(&self) -> String {
        self.actions
            .as_ref()
            .and_then(|a| a.eject_media.as_ref())
            .map_or_else(
                || format!("{}/Actions/VirtualMedia.EjectMedia", self.odata_id),
                |a| a.target.clone(),
            )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualMediaActions {
    #[serde(rename = "#VirtualMedia.InsertMedia", default)]
    pub insert_media: Option<ActionTarget>,
    #[serde(rename = "#VirtualMedia.EjectMedia", default)]
    pub eject_media: Option<ActionTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionTarget {
    pub target: String,
}

/// Body of `VirtualMedia.InsertMedia`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InsertMediaRequest {
    pub image: String,
    pub inserted: bool,
    pub write_protected: bool,
}

/// One-time boot override targets used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BootSourceTarget {
    Cd,
}

/// Reset types used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetType {
    ForceRestart,
}
