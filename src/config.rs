use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DriveError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_ENTRIES: usize = 10;
pub const DEFAULT_LOOKUP_PAGE_SIZE: usize = 100;

/// Limits applied to a single chunked file transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bytes per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Hard cap on the size of one transferred file; no default, the host decides
    pub max_total_size: u64,
    /// Retries per chunk after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl TransferConfig {
    pub fn new(max_total_size: u64) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_total_size,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DriveError::InvalidConfig {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Page sizes used while browsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Used when a browse request carries no `max_entries`
    #[serde(default = "default_max_entries")]
    pub default_max_entries: usize,
    /// Page size for name lookups during path resolution
    #[serde(default = "default_lookup_page_size")]
    pub lookup_page_size: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_max_entries: DEFAULT_MAX_ENTRIES,
            lookup_page_size: DEFAULT_LOOKUP_PAGE_SIZE,
        }
    }
}

impl BrowseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_max_entries == 0 {
            return Err(DriveError::InvalidConfig {
                message: "default_max_entries must be greater than zero".to_string(),
            });
        }
        if self.lookup_page_size == 0 {
            return Err(DriveError::InvalidConfig {
                message: "lookup_page_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Top-level configuration for an [`OnlineDrive`](crate::drive::OnlineDrive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub browse: BrowseConfig,
    pub transfer: TransferConfig,
}

impl DriveConfig {
    pub fn new(transfer: TransferConfig) -> Self {
        Self {
            browse: BrowseConfig::default(),
            transfer,
        }
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: DriveConfig =
            serde_json::from_str(raw).map_err(|e| DriveError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.browse.validate()?;
        self.transfer.validate()
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_lookup_page_size() -> usize {
    DEFAULT_LOOKUP_PAGE_SIZE
}
