//! Library client seam.
//!
//! The core only needs three remote operations.  They return boxed futures so
//! the client can live behind `Arc<dyn LibraryClient>` and be swapped for a
//! scripted fake in tests.  Retry and timeout policy belong to the
//! implementation, not to the callers.

use browse_proto::protocol::{
    DeviceProfile, Item, MediaVariant, PlaybackInfoResponse, SortField, SortOrder,
};
use futures_util::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("item {0} not found")]
    NotFound(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

/// Result of probing one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Refreshed metadata for the requested variant.
    Probed(MediaVariant),
    /// The server answered with an explicit error code.
    Failed(String),
    /// The response did not contain the requested variant.
    Missing,
}

impl ProbeOutcome {
    /// Interpret a playback-info response for `variant_id`.
    pub fn from_playback_info(response: PlaybackInfoResponse, variant_id: &str) -> Self {
        if let Some(code) = response.error_code {
            return ProbeOutcome::Failed(code);
        }
        response
            .media_sources
            .into_iter()
            .find(|source| source.id == variant_id)
            .map(ProbeOutcome::Probed)
            .unwrap_or(ProbeOutcome::Missing)
    }

    pub fn into_variant(self) -> Option<MediaVariant> {
        match self {
            ProbeOutcome::Probed(v) => Some(v),
            ProbeOutcome::Failed(_) | ProbeOutcome::Missing => None,
        }
    }
}

/// Listing request for a container.  `limit == None` asks for everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistQuery {
    pub container_id: String,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

pub trait LibraryClient: Send + Sync {
    fn fetch_item<'a>(&'a self, item_id: &'a str) -> BoxFuture<'a, Result<Item, ClientError>>;

    fn probe_variant<'a>(
        &'a self,
        item_id: &'a str,
        variant_id: &'a str,
        profile: &'a DeviceProfile,
    ) -> BoxFuture<'a, Result<ProbeOutcome, ClientError>>;

    fn fetch_playlist<'a>(
        &'a self,
        query: &'a PlaylistQuery,
    ) -> BoxFuture<'a, Result<Vec<Item>, ClientError>>;
}
