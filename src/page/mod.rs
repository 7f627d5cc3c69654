pub mod fragment;
pub mod metadata;
pub mod snapshot;

#[cfg(feature = "chrome")]
pub mod chrome;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use metadata::{ListingMeta, Metadata};

/// One rendered listing card, valid for the pass that produced it.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Raw `id` attribute of the card element, if it had one.
    pub id: Option<String>,
    handle: usize,
}

impl Candidate {
    pub fn new(id: Option<String>, handle: usize) -> Self {
        Self { id, handle }
    }

    pub fn handle(&self) -> usize {
        self.handle
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    /// A single element could not be read. The session is still usable.
    #[error("read failed for `{selector}`: {message}")]
    Read { selector: String, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("page session lost: {0}")]
    Session(String),
}

impl PageError {
    pub fn read(selector: &str, message: impl Into<String>) -> Self {
        PageError::Read {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, PageError::Read { .. })
    }
}

/// The browsing surface the scroll loop drives. Exactly one caller uses it at
/// a time; `close` releases the underlying session.
#[async_trait]
pub trait Page: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    async fn find_candidates(&mut self, selector: &str) -> Result<Vec<Candidate>, PageError>;

    /// Text of the first element matching `selector` inside the candidate.
    /// `Ok(None)` when nothing matches.
    async fn read_text(
        &mut self,
        candidate: &Candidate,
        selector: &str,
    ) -> Result<Option<String>, PageError>;

    /// `(label text, full item text)` for every facet item in the candidate.
    async fn read_facets(
        &mut self,
        candidate: &Candidate,
        item_selector: &str,
        label_selector: &str,
    ) -> Result<Vec<(String, String)>, PageError>;

    /// Raw text of the embedded structured-data script, if present.
    async fn read_metadata_blob(&mut self, selector: &str) -> Result<Option<String>, PageError>;

    async fn extend_content(&mut self) -> Result<(), PageError>;

    async fn content_size_signal(&mut self) -> Result<u64, PageError>;

    async fn wait(&mut self, duration: Duration);

    fn close(&mut self);

    /// Structured metadata keyed by listing id. Never fails: a missing or
    /// malformed blob degrades to an empty map.
    async fn read_structured_metadata(&mut self, selector: &str) -> Metadata {
        match self.read_metadata_blob(selector).await {
            Ok(Some(blob)) => match metadata::parse_json_ld(&blob) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "Malformed structured metadata, continuing without it");
                    Metadata::new()
                }
            },
            Ok(None) => Metadata::new(),
            Err(e) => {
                warn!(error = %e, "Could not read structured metadata");
                Metadata::new()
            }
        }
    }
}
