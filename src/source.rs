use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    types::{AccessToken, DownloadReference, DriveEntry, PageRequest, RemotePage},
};

/// Capabilities every remote entry shape must report
///
/// Providers keep their own wire types and implement this trait instead of
/// converting into a shared struct, so listing and lookup logic stays provider-agnostic.
pub trait RemoteEntry {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn is_container(&self) -> bool;

    /// Byte size, when the remote reports one
    fn size(&self) -> Option<u64>;

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Exact, case-sensitive name match used during path resolution
    fn matches_name(&self, name: &str) -> bool {
        self.name() == name
    }
}

impl RemoteEntry for DriveEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_container(&self) -> bool {
        self.is_container
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }
}

impl DriveEntry {
    /// Normalize any remote entry into the provider-agnostic shape
    pub fn from_remote<E: RemoteEntry + ?Sized>(entry: &E) -> Self {
        let is_container = entry.is_container();
        Self {
            id: entry.id().to_string(),
            name: entry.name().to_string(),
            is_container,
            size: if is_container { None } else { entry.size() },
            modified_at: entry.modified_at(),
        }
    }
}

/// Remote document store API
///
/// Implementors map their transport failures onto `DriveError::Auth`,
/// `DriveError::NotFound` and `DriveError::Transport`.
#[async_trait]
pub trait DriveApi: Send + Sync {
    type Entry: RemoteEntry + Send + Sync;

    /// List top-level containers, optionally narrowed by a search query
    async fn list_containers(
        &self,
        auth: &AccessToken,
        query: Option<&str>,
        page: &PageRequest,
    ) -> Result<RemotePage<Self::Entry>>;

    /// List children of a container root (`item_id = None`) or of a folder item
    async fn list_children(
        &self,
        auth: &AccessToken,
        container_id: &str,
        item_id: Option<&str>,
        page: &PageRequest,
    ) -> Result<RemotePage<Self::Entry>>;

    /// Issue a short-lived direct download reference for an item
    async fn download_reference(
        &self,
        auth: &AccessToken,
        item_id: &str,
    ) -> Result<DownloadReference>;

    /// Retrieve the full byte content behind a download reference
    async fn download_content(
        &self,
        auth: &AccessToken,
        reference: &DownloadReference,
    ) -> Result<Bytes>;

    /// Get a human-readable identifier for this drive (for logging/debugging)
    fn identifier(&self) -> String;
}
