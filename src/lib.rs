pub mod config;
pub mod drive;
pub mod error;
pub mod fetcher;
pub mod lister;
pub mod resolver;
pub mod sharepoint;
pub mod source;
pub mod streamer;
pub mod types;

pub use config::{BrowseConfig, DriveConfig, TransferConfig};
pub use drive::OnlineDrive;
pub use error::{DriveError, Result, SendError};
pub use fetcher::FileFetcher;
pub use lister::DirectoryLister;
pub use resolver::PathResolver;
pub use sharepoint::{GraphDrive, GraphEntry};
pub use source::{DriveApi, RemoteEntry};
pub use streamer::{ChunkSink, ChunkedTransfer, DeliveryState, RetryPolicy, TransferSummary};
pub use types::{
    AccessToken, BrowseRequest, ChunkMessage, Cursor, DownloadReference, DriveEntry, FetchedFile,
    FileMetadata, Listing, PageRequest, RemotePage, ResolvedLocation,
};
