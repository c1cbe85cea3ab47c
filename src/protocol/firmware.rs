//! Firmware metadata carried as shared device attributes
//!
//! The management side advertises a new image by setting six `fw_*` shared
//! attributes. They reach the device either as the reply to an attribute
//! request (nested under `shared`) or as a pushed update (top level). Both
//! forms decode into the same descriptor; a payload missing any field or
//! carrying a wrong type is rejected outright.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata describing one firmware image offered to the device.
///
/// Immutable once decoded; a later offer supersedes it wholesale. The
/// checksum fields are carried but not consumed by the transfer path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirmwareDescriptor {
    #[serde(rename = "fw_title")]
    pub title: String,
    #[serde(rename = "fw_version")]
    pub version: String,
    #[serde(rename = "fw_size")]
    pub size: u64,
    #[serde(rename = "fw_checksum")]
    pub checksum: String,
    #[serde(rename = "fw_checksum_algorithm")]
    pub checksum_algorithm: String,
    #[serde(rename = "fw_tag")]
    pub tag: String,
}

/// Attribute request responses nest the shared attribute map under `shared`.
#[derive(Debug, Deserialize)]
struct AttributeResponseBody {
    shared: FirmwareDescriptor,
}

/// Attribute payload decode errors. Always fatal for the agent: a device
/// offered an image it cannot fully describe must not guess at the rest.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed firmware attributes: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl FirmwareDescriptor {
    /// Decode from an attribute request response payload.
    pub fn from_attribute_response(payload: &[u8]) -> Result<Self, DecodeError> {
        let body: AttributeResponseBody = serde_json::from_slice(payload)?;
        Ok(body.shared)
    }

    /// Decode from a pushed attribute update payload.
    pub fn from_attribute_update(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// File name the image is installed under, and the comparison key against
    /// the currently running executable.
    pub fn target_identity(&self) -> String {
        format!("{}-{}", self.title, self.version)
    }
}
