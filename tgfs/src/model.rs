//! Wire types exchanged with the file tree service.
//!
//! All JSON keys are camelCase. Nothing here is cached: every value is the
//! backend's answer to exactly one request.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One read/write/execute triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Privileges {
    pub can_read: bool,
    pub can_write: bool,
    pub can_execute: bool,
}

impl Privileges {
    pub const FULL: Privileges = Privileges {
        can_read: true,
        can_write: true,
        can_execute: true,
    };

    pub const fn new(can_read: bool, can_write: bool, can_execute: bool) -> Self {
        Self {
            can_read,
            can_write,
            can_execute,
        }
    }
}

/// Backend-owned description of a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    #[serde(alias = "directory")]
    pub is_directory: bool,
    #[serde(default)]
    pub size: u64,
    /// Epoch seconds.
    #[serde(default)]
    pub modification_time: i32,
    #[serde(default)]
    pub owner_privileges: Privileges,
    #[serde(default)]
    pub group_privileges: Privileges,
    #[serde(default)]
    pub others_privileges: Privileges,
}

impl NodeAttributes {
    pub fn with_all_privileges(self, privileges: Privileges) -> Self {
        Self {
            owner_privileges: privileges,
            group_privileges: privileges,
            others_privileges: privileges,
            ..self
        }
    }
}

/// A write instruction; the backend merges `bytes` into the file at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFile {
    pub path: String,
    #[serde(serialize_with = "bytes_to_base64", deserialize_with = "bytes_from_base64")]
    pub bytes: Vec<u8>,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub path: String,
    pub target_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncateRequest {
    pub path: String,
    pub size: u64,
}

/// One directory entry: a bare name, no path and no attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
}

/// Success marker returned by the creation endpoints. Its content is opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub message: Option<String>,
}

// byte arrays travel as base64 strings inside JSON
fn bytes_to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&B64.encode(bytes))
}

fn bytes_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    B64.decode(encoded).map_err(serde::de::Error::custom)
}
