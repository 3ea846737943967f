use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::DriveConfig,
    error::Result,
    fetcher::FileFetcher,
    lister::DirectoryLister,
    resolver::PathResolver,
    source::DriveApi,
    streamer::{ChunkSink, ChunkedTransfer, TransferSummary},
    types::{AccessToken, BrowseRequest, Listing},
};

/// Browse and download entry points over a single remote drive
///
/// Credentials are passed per call and never retained, so one instance can
/// serve requests for any number of accounts.
pub struct OnlineDrive<A: DriveApi> {
    api: Arc<A>,
    config: DriveConfig,
    resolver: PathResolver<A>,
    lister: DirectoryLister<A>,
    fetcher: FileFetcher<A>,
}

impl<A: DriveApi> OnlineDrive<A> {
    pub fn new(api: Arc<A>, config: DriveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolver: PathResolver::new(api.clone())
                .with_page_size(config.browse.lookup_page_size),
            lister: DirectoryLister::new(api.clone()),
            fetcher: FileFetcher::new(api.clone()),
            api,
            config,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Resolve the request prefix and list one page beneath it
    ///
    /// An empty prefix lists top-level containers.
    pub async fn browse(&self, auth: &AccessToken, request: &BrowseRequest) -> Result<Listing> {
        let max_entries = request
            .max_entries
            .unwrap_or(self.config.browse.default_max_entries);

        let location = self
            .resolver
            .resolve(&request.prefix, auth)
            .await
            .inspect_err(|e| warn!(prefix = %request.prefix, error = %e, "path resolution failed"))?;

        let listing = self
            .lister
            .list(auth, &location, max_entries, request.cursor.as_ref())
            .await?;

        info!(
            drive = %self.api.identifier(),
            prefix = %request.prefix,
            entries = listing.entries.len(),
            more = !listing.is_last_page(),
            "browsed"
        );
        Ok(listing)
    }

    /// Fetch a file and prepare its chunked transfer
    ///
    /// Oversized files fail here, before any chunk is produced.
    pub async fn download(&self, auth: &AccessToken, item_id: &str) -> Result<ChunkedTransfer> {
        let file = self.fetcher.fetch(auth, item_id).await?;
        ChunkedTransfer::new(file, &self.config.transfer)
    }

    /// Fetch a file and deliver all of its chunks to `sink`
    pub async fn download_to<S: ChunkSink + ?Sized>(
        &self,
        auth: &AccessToken,
        item_id: &str,
        sink: &mut S,
    ) -> Result<TransferSummary> {
        let transfer = self.download(auth, item_id).await?;
        transfer.deliver_all(sink).await
    }
}
