use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{fragment, Candidate, Page, PageError};

/// Replays saved HTML captures of an infinite-scroll page. Each call to
/// `extend_content` reveals the next capture; once the last one is showing
/// the content size stops changing, which the scroll loop reads as a stall.
pub struct SnapshotPage {
    snapshots: Vec<String>,
    current: usize,
    cards: Vec<String>,
    paced: bool,
    closed: bool,
}

impl SnapshotPage {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            current: 0,
            cards: Vec::new(),
            paced: false,
            closed: false,
        }
    }

    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let snapshots = paths
            .iter()
            .map(|p| read_snapshot(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(snapshots))
    }

    /// Honour waits with real sleeps instead of skipping them.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    fn document(&self) -> Result<&str, PageError> {
        if self.closed {
            return Err(PageError::Session("snapshot page already closed".into()));
        }
        self.snapshots
            .get(self.current)
            .map(String::as_str)
            .ok_or_else(|| PageError::Session("no snapshots loaded".into()))
    }

    fn card(&self, candidate: &Candidate, selector: &str) -> Result<&str, PageError> {
        self.cards
            .get(candidate.handle())
            .map(String::as_str)
            .ok_or_else(|| PageError::read(selector, "stale candidate handle"))
    }
}

fn read_snapshot(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))
}

#[async_trait]
impl Page for SnapshotPage {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        if self.snapshots.is_empty() {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: "no snapshots to replay".into(),
            });
        }
        info!("Replaying {} snapshots in place of {}", self.snapshots.len(), url);
        self.current = 0;
        self.cards.clear();
        Ok(())
    }

    async fn find_candidates(&mut self, selector: &str) -> Result<Vec<Candidate>, PageError> {
        let found = fragment::cards(self.document()?, selector)?;
        self.cards.clear();
        let mut candidates = Vec::with_capacity(found.len());
        for (handle, (id, html)) in found.into_iter().enumerate() {
            self.cards.push(html);
            candidates.push(Candidate::new(id, handle));
        }
        Ok(candidates)
    }

    async fn read_text(
        &mut self,
        candidate: &Candidate,
        selector: &str,
    ) -> Result<Option<String>, PageError> {
        fragment::first_text(self.card(candidate, selector)?, selector)
    }

    async fn read_facets(
        &mut self,
        candidate: &Candidate,
        item_selector: &str,
        label_selector: &str,
    ) -> Result<Vec<(String, String)>, PageError> {
        fragment::facets(
            self.card(candidate, item_selector)?,
            item_selector,
            label_selector,
        )
    }

    async fn read_metadata_blob(&mut self, selector: &str) -> Result<Option<String>, PageError> {
        fragment::script_body(self.document()?, selector)
    }

    async fn extend_content(&mut self) -> Result<(), PageError> {
        self.document()?;
        if self.current + 1 < self.snapshots.len() {
            self.current += 1;
        }
        debug!(snapshot = self.current, "Extended content");
        Ok(())
    }

    async fn content_size_signal(&mut self) -> Result<u64, PageError> {
        Ok(self.document()?.len() as u64)
    }

    async fn wait(&mut self, duration: Duration) {
        if self.paced {
            tokio::time::sleep(duration).await;
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.cards.clear();
    }
}
