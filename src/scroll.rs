use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::dataset::{Aggregator, Table};
use crate::extract::{extract_candidate, ExtractError, SkipReason};
use crate::ledger::Ledger;
use crate::page::{Page, PageError};
use crate::settings::{Settings, SiteSelectors};

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    Iterating,
    AwaitingMoreContent,
    Stalled,
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    TargetReached,
    BudgetExhausted,
    Stalled,
    Fatal(String),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::TargetReached => f.write_str("target reached"),
            Termination::BudgetExhausted => f.write_str("scroll budget exhausted"),
            Termination::Stalled => f.write_str("no new content after scrolling"),
            Termination::Fatal(e) => write!(f, "fatal page error: {e}"),
        }
    }
}

/// Everything a run accumulates, threaded through the state transitions.
#[derive(Debug, Default)]
pub struct RunState {
    pub ledger: Ledger,
    pub aggregator: Aggregator,
    pub attempts: u32,
    pub passes: u32,
    pub skips: BTreeMap<&'static str, usize>,
}

impl RunState {
    pub fn accepted(&self) -> usize {
        self.aggregator.len()
    }

    fn record_skip(&mut self, reason: &SkipReason) {
        *self.skips.entry(reason.tag()).or_default() += 1;
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub termination: Termination,
    pub passes: u32,
    pub attempts: u32,
    pub accepted: usize,
    pub unique_ids: usize,
    pub skips: BTreeMap<&'static str, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn print(&self) {
        println!("\nFinished: {}", self.termination);
        println!("  Passes:          {}", self.passes);
        println!("  Scroll attempts: {}", self.attempts);
        println!("  Records:         {}", self.accepted);
        println!("  Unique ids:      {}", self.unique_ids);
        if self.skips.is_empty() {
            println!("  Skipped:         0");
        } else {
            for (tag, count) in &self.skips {
                println!("  Skipped ({tag}): {count}");
            }
        }
        let secs = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        println!("  Run time:        {secs:.1}s");
    }
}

pub struct Harvest {
    pub table: Table,
    pub report: RunReport,
}

/// Holds the page for the duration of a run and closes it exactly once,
/// whichever way the run ends.
struct Session<P: Page> {
    page: P,
    open: bool,
}

impl<P: Page> Session<P> {
    fn acquire(page: P) -> Self {
        Self { page, open: true }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.page.close();
        }
    }
}

impl<P: Page> Drop for Session<P> {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct Controller<'a> {
    settings: &'a Settings,
    selectors: &'a SiteSelectors,
    progress: ProgressBar,
}

impl<'a> Controller<'a> {
    pub fn new(settings: &'a Settings, selectors: &'a SiteSelectors) -> Self {
        Self {
            settings,
            selectors,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run the acquisition loop to completion. Never fails: a fatal page error
    /// ends the loop early and whatever was accepted is still finalized.
    pub async fn harvest<P: Page>(&self, page: P, url: &str) -> Harvest {
        let started_at = Utc::now();
        let mut session = Session::acquire(page);
        let mut run = RunState::default();

        let termination = self.drive(&mut session.page, url, &mut run).await;
        session.release();
        self.progress.finish_and_clear();

        match &termination {
            Termination::Fatal(e) => warn!("Run aborted: {}", e),
            other => info!("Run finished: {}", other),
        }

        let report = RunReport {
            termination,
            passes: run.passes,
            attempts: run.attempts,
            accepted: run.accepted(),
            unique_ids: run.ledger.len(),
            skips: run.skips.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        Harvest {
            table: run.aggregator.finalize(),
            report,
        }
    }

    async fn drive<P: Page>(&self, page: &mut P, url: &str, run: &mut RunState) -> Termination {
        let mut state = State::Idle;
        loop {
            debug!(?state, accepted = run.accepted(), attempts = run.attempts, "Scroll state");
            state = match state {
                State::Idle => match page.navigate(url).await {
                    Ok(()) => State::Iterating,
                    Err(e) => State::Terminated(Termination::Fatal(e.to_string())),
                },
                State::Iterating => match self.iterate(page, run).await {
                    Err(e) => State::Terminated(Termination::Fatal(e.to_string())),
                    Ok(()) if run.accepted() >= self.settings.target_record_count => {
                        State::Terminated(Termination::TargetReached)
                    }
                    Ok(()) if run.attempts >= self.settings.max_scroll_attempts => {
                        State::Terminated(Termination::BudgetExhausted)
                    }
                    Ok(()) => State::AwaitingMoreContent,
                },
                State::AwaitingMoreContent => match self.await_more(page, run).await {
                    Ok(true) => State::Iterating,
                    Ok(false) => State::Stalled,
                    Err(e) => State::Terminated(Termination::Fatal(e.to_string())),
                },
                State::Stalled => return Termination::Stalled,
                State::Terminated(t) => return t,
            };
        }
    }

    /// One pass over the candidates currently on the page.
    async fn iterate<P: Page>(&self, page: &mut P, run: &mut RunState) -> Result<(), PageError> {
        run.passes += 1;
        let candidates = page.find_candidates(&self.selectors.card).await?;
        let metadata = page
            .read_structured_metadata(&self.selectors.metadata_script)
            .await;
        info!(
            pass = run.passes,
            found = candidates.len(),
            accepted = run.accepted(),
            "Scanning listings"
        );

        let mut new = 0usize;
        for candidate in &candidates {
            if run.accepted() >= self.settings.target_record_count {
                break;
            }
            let Some(id) = self.selectors.listing_id(candidate) else {
                let reason = SkipReason::ReadError("listing without id".into());
                warn!(%reason, "Skipping listing");
                run.record_skip(&reason);
                continue;
            };
            if run.ledger.has_seen(&id) {
                continue;
            }
            if !self.settings.retry_failed {
                run.ledger.mark_seen(&id);
            }

            match extract_candidate(page, candidate, &id, self.selectors, &metadata).await {
                Ok(record) => {
                    run.ledger.mark_seen(&id);
                    debug!(id = %id, title = ?record.title, "Scraped listing");
                    run.aggregator.accept(record);
                    self.progress.inc(1);
                    new += 1;
                }
                Err(ExtractError::Skip(reason)) => {
                    warn!(id = %id, %reason, "Skipping listing");
                    run.record_skip(&reason);
                }
                Err(ExtractError::Fatal(e)) => return Err(e),
            }
        }

        info!(new, total = run.accepted(), "Pass complete");
        Ok(())
    }

    /// Extend the page and report whether it grew.
    async fn await_more<P: Page>(&self, page: &mut P, run: &mut RunState) -> Result<bool, PageError> {
        let before = page.content_size_signal().await?;
        page.extend_content().await?;
        page.wait(self.settings.content_wait()).await;
        let after = page.content_size_signal().await?;
        debug!(before, after, "Content size");

        if after == before {
            info!("No new content after scrolling");
            return Ok(false);
        }
        run.attempts += 1;
        let jitter = self.settings.jitter();
        page.wait(jitter).await;
        Ok(true)
    }
}
