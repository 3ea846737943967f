use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{DriveError, Result};

/// Bearer credential for one logical operation (a browse or a download)
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DriveError::Auth {
                message: "Access token not found in credentials".to_string(),
            });
        }
        Ok(Self(token))
    }

    /// Extract the `access_token` field from a provider credentials object
    pub fn from_credentials(credentials: &serde_json::Value) -> Result<Self> {
        let token = credentials
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriveError::Auth {
                message: "Access token not found in credentials".to_string(),
            })?;
        Self::new(token)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Concrete remote location produced by path resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    /// No container named: enumerate top-level containers
    Containers,
    /// A container, optionally narrowed to a folder item within it
    Container {
        container_id: String,
        item_id: Option<String>,
    },
}

impl ResolvedLocation {
    pub fn container_id(&self) -> Option<&str> {
        match self {
            ResolvedLocation::Containers => None,
            ResolvedLocation::Container { container_id, .. } => Some(container_id),
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            ResolvedLocation::Containers => None,
            ResolvedLocation::Container { item_id, .. } => item_id.as_deref(),
        }
    }
}

/// One child node of a listing, independent of the remote provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEntry {
    pub id: String,
    pub name: String,
    pub is_container: bool,
    /// Byte size; only set for files
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Opaque continuation token handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A page of entries; `next_cursor` is `None` on the last page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    pub entries: Vec<DriveEntry>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_cursor: Option<Cursor>,
}

impl Listing {
    pub fn is_last_page(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Browse request as received from the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseRequest {
    /// Path prefix; empty lists all containers
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

/// Page size and continuation token for a single remote listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub size: usize,
    pub token: Option<String>,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { size, token: None }
    }
}

/// Raw page returned by a remote listing call
#[derive(Debug, Clone)]
pub struct RemotePage<E> {
    pub entries: Vec<E>,
    pub next_token: Option<String>,
}

/// Short-lived direct download handle for a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReference {
    pub url: String,
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// A downloaded file, owned by whoever holds it next
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Bytes,
    pub name: String,
    pub mime_type: String,
}

impl FetchedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// File identity carried by the terminal chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub mime_type: String,
}

/// One chunk of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessage {
    pub transfer_id: Uuid,
    pub sequence: u64,
    pub total_length: u64,
    pub payload: Bytes,
    pub is_final: bool,
    /// Present iff `is_final`
    pub metadata: Option<FileMetadata>,
}
