use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use rand::Rng;
use serde::Deserialize;

use crate::page::Candidate;

const DEFAULT_START_URL: &str = "https://www.magicbricks.com/property-for-sale/residential-real-estate?bedroom=&proptype=Multistorey-Apartment,Builder-Floor-Apartment,Penthouse,Studio-Apartment,Residential-House,Villa&cityName=New-Delhi";

/// Run settings. Defaults, overridden by `HARVEST_*` environment variables,
/// overridden again by CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_record_count: usize,
    pub max_scroll_attempts: u32,
    pub content_wait_seconds: f64,
    pub jitter_min_seconds: f64,
    pub jitter_max_seconds: f64,
    /// Leave failed candidates unmarked so a later pass can retry them.
    pub retry_failed: bool,
    pub start_url: String,
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_record_count: 1000,
            max_scroll_attempts: 200,
            content_wait_seconds: 3.0,
            jitter_min_seconds: 0.0,
            jitter_max_seconds: 1.0,
            retry_failed: true,
            start_url: DEFAULT_START_URL.to_string(),
            output: PathBuf::from("listings.csv"),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(Environment::with_prefix("HARVEST").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Invalid HARVEST_* settings")
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_record_count == 0 {
            bail!("target record count must be at least 1");
        }
        seconds("content wait", self.content_wait_seconds)?;
        let min = seconds("jitter min", self.jitter_min_seconds)?;
        let max = seconds("jitter max", self.jitter_max_seconds)?;
        if min > max {
            bail!(
                "jitter range [{}, {}) is invalid",
                self.jitter_min_seconds,
                self.jitter_max_seconds
            );
        }
        Ok(())
    }

    pub fn content_wait(&self) -> Duration {
        Duration::from_secs_f64(self.content_wait_seconds)
    }

    /// Random pause drawn from `[jitter_min, jitter_max)`.
    pub fn jitter(&self) -> Duration {
        let secs = if self.jitter_max_seconds > self.jitter_min_seconds {
            rand::rng().random_range(self.jitter_min_seconds..self.jitter_max_seconds)
        } else {
            self.jitter_min_seconds
        };
        Duration::from_secs_f64(secs)
    }
}

/// Seconds as a `Duration`; NaN, negative, infinite or overflowing values are errors.
fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{name} must be a non-negative number of seconds, got {value}"))
}

/// CSS wiring for the listing site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub card: String,
    pub id_prefix: String,
    pub title: String,
    pub price: String,
    pub area: String,
    pub locality: String,
    pub address: String,
    pub facet_item: String,
    pub facet_label: String,
    pub metadata_script: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            card: ".mb-srp__list".into(),
            id_prefix: "cardid".into(),
            title: ".mb-srp__card--title".into(),
            price: ".mb-srp__card__price--amount".into(),
            area: ".mb-srp__card__summary--value".into(),
            locality: ".mb-srp__card__society--name".into(),
            address: ".mb-srp__card--address".into(),
            facet_item: ".mb-srp__card__summary__list--item".into(),
            facet_label: "label".into(),
            metadata_script: r#"script[type="application/ld+json"]"#.into(),
        }
    }
}

impl SiteSelectors {
    pub fn from_file(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Invalid selector file {}", path.display()))
    }

    /// Listing id from the card's id attribute, prefix stripped.
    pub fn listing_id(&self, candidate: &Candidate) -> Option<String> {
        let raw = candidate.id.as_deref()?.trim();
        let id = raw.strip_prefix(self.id_prefix.as_str()).unwrap_or(raw);
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.target_record_count, 1000);
        assert_eq!(s.max_scroll_attempts, 200);
        assert_eq!(s.content_wait(), Duration::from_secs(3));
    }

    #[test]
    fn jitter_stays_in_range() {
        let s = Settings {
            jitter_min_seconds: 0.5,
            jitter_max_seconds: 1.5,
            ..Settings::default()
        };
        for _ in 0..100 {
            let j = s.jitter().as_secs_f64();
            assert!((0.5..1.5).contains(&j), "jitter {j} out of range");
        }
    }

    #[test]
    fn empty_jitter_range_is_fixed() {
        let s = Settings {
            jitter_min_seconds: 0.25,
            jitter_max_seconds: 0.25,
            ..Settings::default()
        };
        assert_eq!(s.jitter(), Duration::from_secs_f64(0.25));
    }

    #[test]
    fn rejects_bad_ranges() {
        let s = Settings {
            jitter_min_seconds: 2.0,
            jitter_max_seconds: 1.0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());

        let s = Settings {
            target_record_count: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());

        for bad in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            let wait = Settings {
                content_wait_seconds: bad,
                ..Settings::default()
            };
            assert!(wait.validate().is_err(), "content wait {bad} accepted");

            let jitter = Settings {
                jitter_max_seconds: bad,
                ..Settings::default()
            };
            assert!(jitter.validate().is_err(), "jitter max {bad} accepted");
        }

        let s = Settings {
            jitter_min_seconds: f64::INFINITY,
            jitter_max_seconds: f64::INFINITY,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    // One test owns the HARVEST_* variables so parallel tests never see them.
    #[test]
    fn environment_overrides_defaults() {
        std::env::set_var("HARVEST_TARGET_RECORD_COUNT", "25");
        std::env::set_var("HARVEST_CONTENT_WAIT_SECONDS", "0.5");
        std::env::set_var("HARVEST_RETRY_FAILED", "false");
        let loaded = Settings::load();
        std::env::remove_var("HARVEST_TARGET_RECORD_COUNT");
        std::env::remove_var("HARVEST_CONTENT_WAIT_SECONDS");
        std::env::remove_var("HARVEST_RETRY_FAILED");

        let s = loaded.unwrap();
        assert_eq!(s.target_record_count, 25);
        assert_eq!(s.content_wait(), Duration::from_millis(500));
        assert!(!s.retry_failed);
        assert_eq!(s.max_scroll_attempts, 200);
        s.validate().unwrap();

        std::env::set_var("HARVEST_JITTER_MAX_SECONDS", "inf");
        let loaded = Settings::load();
        std::env::remove_var("HARVEST_JITTER_MAX_SECONDS");
        assert!(loaded.and_then(|s| s.validate()).is_err());
    }

    #[test]
    fn listing_ids() {
        let sel = SiteSelectors::default();
        let id = |raw: Option<&str>| sel.listing_id(&Candidate::new(raw.map(str::to_string), 0));
        assert_eq!(id(Some("cardid71234")), Some("71234".to_string()));
        assert_eq!(id(Some("71234")), Some("71234".to_string()));
        assert_eq!(id(Some("cardid")), None);
        assert_eq!(id(None), None);
    }
}
