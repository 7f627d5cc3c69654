use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use tracing::{debug, info};

use super::{fragment, Candidate, Page, PageError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight); true";
const HEIGHT_JS: &str = "document.body.scrollHeight";

#[derive(Deserialize)]
struct CardCapture {
    id: Option<String>,
    html: String,
}

/// Live page in a headless Chrome tab. Card HTML is captured when candidates
/// are enumerated, so field reads never touch elements the page may have
/// re-rendered since.
pub struct ChromePage {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    cards: Vec<String>,
}

impl ChromePage {
    pub fn launch() -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .map_err(|e| anyhow!("Invalid browser launch options: {e}"))?;

        let browser = Browser::new(options).context("Failed to launch headless Chrome")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(NAVIGATION_TIMEOUT);
        tab.set_user_agent(USER_AGENT, None, None)
            .context("Failed to set user agent")?;

        info!("Launched headless Chrome");
        Ok(Self {
            browser: Some(browser),
            tab,
            cards: Vec::new(),
        })
    }

    fn live_tab(&self) -> Result<&Tab, PageError> {
        match self.browser {
            Some(_) => Ok(&self.tab),
            None => Err(PageError::Session("browser already closed".into())),
        }
    }

    /// Evaluate an expression whose result is a JSON string.
    fn eval_json(&self, expression: &str) -> Result<serde_json::Value, PageError> {
        let result = self
            .live_tab()?
            .evaluate(expression, false)
            .map_err(|e| PageError::Session(e.to_string()))?;
        match result.value {
            Some(serde_json::Value::String(s)) => {
                serde_json::from_str(&s).map_err(|e| PageError::Session(e.to_string()))
            }
            Some(other) => Ok(other),
            None => Ok(serde_json::Value::Null),
        }
    }

    fn card(&self, candidate: &Candidate, selector: &str) -> Result<&str, PageError> {
        self.cards
            .get(candidate.handle())
            .map(String::as_str)
            .ok_or_else(|| PageError::read(selector, "stale candidate handle"))
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl Page for ChromePage {
    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        let nav_err = |e: anyhow::Error| PageError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        self.live_tab()?
            .navigate_to(url)
            .map_err(nav_err)?
            .wait_until_navigated()
            .map_err(nav_err)?;
        info!("Loaded {}", url);
        Ok(())
    }

    async fn find_candidates(&mut self, selector: &str) -> Result<Vec<Candidate>, PageError> {
        let expression = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({})).map(el => ({{ id: el.getAttribute('id'), html: el.outerHTML }})))",
            js_string(selector)
        );
        let value = self.eval_json(&expression)?;
        let captures: Vec<CardCapture> = serde_json::from_value(value)
            .map_err(|e| PageError::Session(format!("unexpected card capture: {e}")))?;

        self.cards.clear();
        let mut candidates = Vec::with_capacity(captures.len());
        for (handle, capture) in captures.into_iter().enumerate() {
            self.cards.push(capture.html);
            candidates.push(Candidate::new(capture.id, handle));
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
        let expression = format!(
            "JSON.stringify((document.querySelector({}) || {{}}).innerHTML || null)",
            js_string(selector)
        );
        match self.eval_json(&expression)? {
            serde_json::Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn extend_content(&mut self) -> Result<(), PageError> {
        self.live_tab()?
            .evaluate(SCROLL_JS, false)
            .map_err(|e| PageError::Session(e.to_string()))?;
        Ok(())
    }

    async fn content_size_signal(&mut self) -> Result<u64, PageError> {
        let value = self.eval_json(HEIGHT_JS)?;
        let height = value
            .as_f64()
            .ok_or_else(|| PageError::Session(format!("unexpected page height: {value}")))?;
        debug!(height, "Page height");
        Ok(height as u64)
    }

    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn close(&mut self) {
        if self.browser.take().is_some() {
            self.cards.clear();
            info!("Closed headless Chrome");
        }
    }
}
