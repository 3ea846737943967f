use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{DriveError, Result},
    source::DriveApi,
    types::{AccessToken, FetchedFile},
};

const GENERIC_CONTENT_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

/// Downloads a single file: first a direct-download reference, then its bytes
pub struct FileFetcher<A: DriveApi> {
    api: Arc<A>,
}

impl<A: DriveApi> FileFetcher<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, auth: &AccessToken, item_id: &str) -> Result<FetchedFile> {
        let reference = self
            .api
            .download_reference(auth, item_id)
            .await
            .map_err(collapse)?;
        debug!(item = %item_id, name = %reference.name, size = ?reference.size, "got download reference");

        let bytes = self
            .api
            .download_content(auth, &reference)
            .await
            .map_err(collapse)?;

        let mime_type = resolve_mime_type(reference.content_type.as_deref(), &reference.name);
        info!(
            name = %reference.name,
            bytes = bytes.len(),
            mime = %mime_type,
            "downloaded file"
        );

        Ok(FetchedFile {
            bytes,
            name: reference.name,
            mime_type,
        })
    }
}

/// Everything except auth and missing-item failures is a transport failure here
fn collapse(err: DriveError) -> DriveError {
    match err {
        DriveError::Auth { .. } | DriveError::NotFound { .. } | DriveError::Transport { .. } => err,
        other => DriveError::Transport {
            message: other.to_string(),
        },
    }
}

/// Pick the remote content type unless it is missing or generic, else infer from the name
pub fn resolve_mime_type(reported: Option<&str>, file_name: &str) -> String {
    let essence = reported
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && !GENERIC_CONTENT_TYPES.contains(&ct.as_str()));

    match essence {
        Some(ct) => ct,
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
