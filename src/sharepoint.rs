use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::{
    error::{DriveError, Result},
    source::{DriveApi, RemoteEntry},
    types::{AccessToken, DownloadReference, PageRequest, RemotePage},
};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const USER_AGENT: &str = concat!("drive-transfer/", env!("CARGO_PKG_VERSION"));

/// SharePoint document libraries reached through Microsoft Graph
///
/// Containers are sites; their children come from the site's default
/// document library. Drive item ids are handed out qualified as
/// `{driveId}/{itemId}` so later calls can address them without the site.
#[derive(Clone)]
pub struct GraphDrive {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GraphCollection<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// A SharePoint site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSite {
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

/// A file or folder inside a document library
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphItem {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub folder: Option<FolderFacet>,
    pub file: Option<FileFacet>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
    pub parent_reference: Option<ParentReference>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
    #[serde(skip)]
    qualified_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    pub child_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub drive_id: Option<String>,
}

impl GraphItem {
    fn qualified(mut self) -> Self {
        self.qualified_id = match self
            .parent_reference
            .as_ref()
            .and_then(|p| p.drive_id.as_deref())
        {
            Some(drive_id) => format!("{}/{}", drive_id, self.id),
            None => self.id.clone(),
        };
        self
    }
}

/// Entry shapes returned by Graph listings
#[derive(Debug, Clone)]
pub enum GraphEntry {
    Site(GraphSite),
    Item(GraphItem),
}

impl RemoteEntry for GraphEntry {
    fn id(&self) -> &str {
        match self {
            GraphEntry::Site(site) => &site.id,
            GraphEntry::Item(item) => &item.qualified_id,
        }
    }

    fn name(&self) -> &str {
        match self {
            GraphEntry::Site(site) => site
                .display_name
                .as_deref()
                .or(site.name.as_deref())
                .unwrap_or(site.id.as_str()),
            GraphEntry::Item(item) => &item.name,
        }
    }

    fn is_container(&self) -> bool {
        match self {
            GraphEntry::Site(_) => true,
            GraphEntry::Item(item) => item.folder.is_some(),
        }
    }

    fn size(&self) -> Option<u64> {
        match self {
            GraphEntry::Site(_) => None,
            GraphEntry::Item(item) => item.size,
        }
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GraphEntry::Site(site) => site.last_modified_date_time,
            GraphEntry::Item(item) => item.last_modified_date_time,
        }
    }

    /// Sites match on either their display name or their URL name
    fn matches_name(&self, name: &str) -> bool {
        match self {
            GraphEntry::Site(site) => {
                site.display_name.as_deref() == Some(name) || site.name.as_deref() == Some(name)
            }
            GraphEntry::Item(item) => item.name == name,
        }
    }
}

/// Split a qualified item id into drive and item parts
fn split_item_id(item_id: &str) -> Option<(&str, &str)> {
    item_id
        .split_once('/')
        .filter(|(drive, item)| !drive.is_empty() && !item.is_empty())
}

impl GraphDrive {
    pub fn new() -> Self {
        Self::with_base_url(GRAPH_BASE_URL.to_string())
    }

    /// Point at another Graph endpoint (national clouds, tests)
    ///
    /// Falls back to a default client, without the timeout or user agent,
    /// if the configured one cannot be built. Use
    /// [`try_with_base_url`](Self::try_with_base_url) to fail instead.
    pub fn with_base_url(base_url: String) -> Self {
        let client = Self::build_client().unwrap_or_else(|e| {
            warn!(
                error = %e,
                "failed to build Graph HTTP client, using defaults without timeout or user agent"
            );
            Client::new()
        });
        Self::from_parts(client, &base_url)
    }

    pub fn try_with_base_url(base_url: String) -> Result<Self> {
        let client = Self::build_client().map_err(|e| DriveError::InvalidConfig {
            message: format!("Failed to build Graph HTTP client: {}", e),
        })?;
        Ok(Self::from_parts(client, &base_url))
    }

    fn build_client() -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
    }

    fn from_parts(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sites_url(&self) -> String {
        format!("{}/sites", self.base_url)
    }

    fn children_url(&self, site_id: &str, item_id: Option<&str>) -> String {
        match item_id {
            None => format!("{}/sites/{}/drive/root/children", self.base_url, site_id),
            Some(id) => match split_item_id(id) {
                Some((drive, item)) => {
                    format!("{}/drives/{}/items/{}/children", self.base_url, drive, item)
                }
                None => format!("{}/sites/{}/drive/items/{}/children", self.base_url, site_id, id),
            },
        }
    }

    fn item_url(&self, item_id: &str) -> Option<String> {
        split_item_id(item_id)
            .map(|(drive, item)| format!("{}/drives/{}/items/{}", self.base_url, drive, item))
    }

    /// Only follow continuation links that stay on the API host
    fn check_next_link<'a>(&self, link: &'a str) -> Result<&'a str> {
        let rest = link.strip_prefix(self.base_url.as_str());
        match rest {
            Some(r) if r.is_empty() || r.starts_with('/') => Ok(link),
            _ => Err(DriveError::Transport {
                message: format!("refusing to follow continuation link outside {}", self.base_url),
            }),
        }
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        auth: &AccessToken,
        url: &str,
        query: &[(&str, String)],
        page: &PageRequest,
        subject: &str,
    ) -> Result<GraphCollection<T>> {
        let request = match &page.token {
            Some(link) => self.client.get(self.check_next_link(link)?),
            None => {
                let mut params: Vec<(&str, String)> = query.to_vec();
                params.push(("$top", page.size.to_string()));
                self.client.get(url).query(&params)
            }
        };

        let response = request
            .bearer_auth(auth.secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = check_status(response, subject).await?;
        Ok(response.json().await?)
    }
}

impl Default for GraphDrive {
    fn default() -> Self {
        Self::new()
    }
}

/// Map Graph status codes onto the error taxonomy
async fn check_status(response: Response, subject: &str) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Auth {
                message: format!("Graph API returned {} for {}: {}", status, subject, body),
            })
        }
        StatusCode::NOT_FOUND => Err(DriveError::NotFound {
            path: subject.to_string(),
        }),
        status => {
            let message = format!(
                "Unexpected status {} for {}: {}",
                status,
                subject,
                response.text().await.unwrap_or_default()
            );
            Err(DriveError::Transport { message })
        }
    }
}

#[async_trait]
impl DriveApi for GraphDrive {
    type Entry = GraphEntry;

    async fn list_containers(
        &self,
        auth: &AccessToken,
        query: Option<&str>,
        page: &PageRequest,
    ) -> Result<RemotePage<GraphEntry>> {
        let search = query.unwrap_or("*").to_string();
        let collection: GraphCollection<GraphSite> = self
            .get_page(auth, &self.sites_url(), &[("search", search)], page, "sites")
            .await?;

        Ok(RemotePage {
            entries: collection.value.into_iter().map(GraphEntry::Site).collect(),
            next_token: collection.next_link,
        })
    }

    async fn list_children(
        &self,
        auth: &AccessToken,
        container_id: &str,
        item_id: Option<&str>,
        page: &PageRequest,
    ) -> Result<RemotePage<GraphEntry>> {
        let url = self.children_url(container_id, item_id);
        let subject = item_id.unwrap_or(container_id);
        let collection: GraphCollection<GraphItem> =
            self.get_page(auth, &url, &[], page, subject).await?;

        Ok(RemotePage {
            entries: collection
                .value
                .into_iter()
                .map(|item| GraphEntry::Item(item.qualified()))
                .collect(),
            next_token: collection.next_link,
        })
    }

    async fn download_reference(
        &self,
        auth: &AccessToken,
        item_id: &str,
    ) -> Result<DownloadReference> {
        let url = self.item_url(item_id).ok_or_else(|| DriveError::NotFound {
            path: item_id.to_string(),
        })?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(auth.secret())
            .header("Accept", "application/json")
            .send()
            .await?;
        let item: GraphItem = check_status(response, item_id).await?.json().await?;

        let url = item.download_url.ok_or_else(|| DriveError::Transport {
            message: format!("no download URL returned for {}", item_id),
        })?;

        Ok(DownloadReference {
            url,
            name: item.name,
            size: item.size,
            content_type: item.file.and_then(|f| f.mime_type),
        })
    }

    async fn download_content(
        &self,
        _auth: &AccessToken,
        reference: &DownloadReference,
    ) -> Result<Bytes> {
        // Download URLs are pre-authenticated; a bearer header would be rejected
        let response = self.client.get(&reference.url).send().await?;
        let response = check_status(response, &reference.name).await?;
        Ok(response.bytes().await?)
    }

    fn identifier(&self) -> String {
        format!("graph://{}", self.base_url)
    }
}
