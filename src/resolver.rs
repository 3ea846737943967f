use std::sync::Arc;
use tracing::debug;

use crate::{
    config::DEFAULT_LOOKUP_PAGE_SIZE,
    error::{DriveError, Result},
    source::{DriveApi, RemoteEntry},
    types::{AccessToken, PageRequest, RemotePage, ResolvedLocation},
};

/// Where a name lookup searches
enum Scope<'a> {
    Containers,
    Children {
        container_id: &'a str,
        parent: Option<&'a str>,
    },
}

/// Resolves a `/`-delimited path into a concrete container and item
///
/// The first segment names a container; each further segment names a child
/// of the previous one. Names match exactly. Lookups page through the remote
/// listing until a match is found, so the result does not depend on page size.
pub struct PathResolver<A: DriveApi> {
    api: Arc<A>,
    page_size: usize,
}

impl<A: DriveApi> PathResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            page_size: DEFAULT_LOOKUP_PAGE_SIZE,
        }
    }

    /// Set the page size used for each lookup call (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Resolve `path`; an empty path yields [`ResolvedLocation::Containers`]
    pub async fn resolve(&self, path: &str, auth: &AccessToken) -> Result<ResolvedLocation> {
        let segments = split_path(path);
        let Some((container_name, rest)) = segments.split_first() else {
            return Ok(ResolvedLocation::Containers);
        };

        let container_id = self
            .find(auth, &Scope::Containers, container_name)
            .await?
            .ok_or_else(|| DriveError::NotFound {
                path: container_name.to_string(),
            })?;
        debug!(container = %container_name, id = %container_id, "resolved container");

        let mut item_id: Option<String> = None;
        for (depth, segment) in rest.iter().enumerate() {
            let scope = Scope::Children {
                container_id: &container_id,
                parent: item_id.as_deref(),
            };
            let child = self
                .find(auth, &scope, segment)
                .await?
                .ok_or_else(|| DriveError::NotFound {
                    path: segments[..depth + 2].join("/"),
                })?;
            debug!(segment = %segment, id = %child, "resolved path segment");
            item_id = Some(child);
        }

        Ok(ResolvedLocation::Container {
            container_id,
            item_id,
        })
    }

    /// Page through `scope` until an entry named `name` turns up
    async fn find(&self, auth: &AccessToken, scope: &Scope<'_>, name: &str) -> Result<Option<String>> {
        let mut page = PageRequest::first(self.page_size);
        loop {
            let remote = self.fetch_page(auth, scope, name, &page).await?;
            if let Some(hit) = remote.entries.iter().find(|e| e.matches_name(name)) {
                return Ok(Some(hit.id().to_string()));
            }
            match remote.next_token {
                Some(token) if page.token.as_deref() == Some(token.as_str()) => {
                    return Err(DriveError::Transport {
                        message: format!(
                            "{} repeated continuation token while looking up '{}'",
                            self.api.identifier(),
                            name
                        ),
                    });
                }
                Some(token) => page.token = Some(token),
                None => return Ok(None),
            }
        }
    }

    async fn fetch_page(
        &self,
        auth: &AccessToken,
        scope: &Scope<'_>,
        name: &str,
        page: &PageRequest,
    ) -> Result<RemotePage<A::Entry>> {
        match scope {
            Scope::Containers => self.api.list_containers(auth, Some(name), page).await,
            Scope::Children {
                container_id,
                parent,
            } => {
                self.api
                    .list_children(auth, container_id, *parent, page)
                    .await
            }
        }
    }
}

/// Split a path into its non-empty segments
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
