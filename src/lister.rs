use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{DriveError, Result},
    source::DriveApi,
    types::{AccessToken, Cursor, DriveEntry, Listing, PageRequest, ResolvedLocation},
};

/// Position inside the remote pagination, serialized into a [`Cursor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CursorState {
    /// Remote token of the page to read; `None` is the first page
    #[serde(rename = "t", skip_serializing_if = "Option::is_none", default)]
    token: Option<String>,
    /// Entries of that page already handed out
    #[serde(rename = "s", default)]
    skip: usize,
    /// Page size the page was requested with, so re-reading it yields the same entries
    #[serde(rename = "n", default)]
    size: usize,
}

impl CursorState {
    fn encode(&self) -> Result<Cursor> {
        let raw = serde_json::to_vec(self).map_err(|e| DriveError::InvalidCursor {
            message: e.to_string(),
        })?;
        Ok(Cursor::new(URL_SAFE_NO_PAD.encode(raw)))
    }

    fn decode(cursor: &Cursor) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(cursor.as_str())
            .map_err(|e| DriveError::InvalidCursor {
                message: e.to_string(),
            })?;
        serde_json::from_slice(&raw).map_err(|e| DriveError::InvalidCursor {
            message: e.to_string(),
        })
    }
}

/// Lists one page of a resolved location
///
/// The remote is asked for at most `max_entries` per call. Remotes that
/// return more are truncated, and the cursor re-reads the same remote page
/// past what was already returned, so consecutive pages never skip or
/// repeat entries.
pub struct DirectoryLister<A: DriveApi> {
    api: Arc<A>,
}

impl<A: DriveApi> DirectoryLister<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn list(
        &self,
        auth: &AccessToken,
        location: &ResolvedLocation,
        max_entries: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Listing> {
        if max_entries == 0 {
            return Err(DriveError::InvalidConfig {
                message: "max_entries must be greater than zero".to_string(),
            });
        }

        let state = cursor.map(CursorState::decode).transpose()?.unwrap_or_default();
        let size = if state.skip > 0 && state.size > 0 {
            state.size
        } else {
            max_entries
        };
        let request = PageRequest {
            size,
            token: state.token.clone(),
        };

        let page = match location {
            ResolvedLocation::Containers => {
                self.api.list_containers(auth, None, &request).await?
            }
            ResolvedLocation::Container {
                container_id,
                item_id,
            } => {
                self.api
                    .list_children(auth, container_id, item_id.as_deref(), &request)
                    .await?
            }
        };

        let entries: Vec<DriveEntry> = page
            .entries
            .iter()
            .skip(state.skip)
            .take(max_entries)
            .map(DriveEntry::from_remote)
            .collect();

        let consumed = state.skip + entries.len();
        let next = if consumed < page.entries.len() {
            Some(CursorState {
                token: state.token,
                skip: consumed,
                size,
            })
        } else {
            page.next_token.map(|token| CursorState {
                token: Some(token),
                skip: 0,
                size: max_entries,
            })
        };

        debug!(
            drive = %self.api.identifier(),
            returned = entries.len(),
            remote = page.entries.len(),
            more = next.is_some(),
            "listed page"
        );

        Ok(Listing {
            entries,
            next_cursor: next.map(|s| s.encode()).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_cursor_state_survives_encoding() {
        let state = CursorState {
            token: Some("https://graph.microsoft.com/v1.0/sites?$skiptoken=x".to_string()),
            skip: 3,
            size: 10,
        };
        let cursor = state.encode().unwrap();
        assert!(!cursor.as_str().contains('/'));
        assert_eq!(CursorState::decode(&cursor).unwrap(), state);
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        let err = CursorState::decode(&Cursor::new("not a cursor!")).unwrap_err();
        assert!(matches!(err, DriveError::InvalidCursor { .. }));

        let not_json = Cursor::new(URL_SAFE_NO_PAD.encode(b"42"));
        assert!(matches!(
            CursorState::decode(&not_json),
            Err(DriveError::InvalidCursor { .. })
        ));
    }
}
