use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::normalize::{normalize_whitespace, parse_area, parse_bedroom_count, parse_currency};
use crate::page::{Candidate, ListingMeta, Metadata, Page, PageError};
use crate::settings::SiteSelectors;

/// One normalized listing. Created once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub title: Option<String>,
    pub bedroom_count: Option<u32>,
    pub price_raw: Option<String>,
    pub price_value: Option<f64>,
    pub area_raw: Option<String>,
    pub area_value: Option<f64>,
    pub locality: Option<String>,
    pub address: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    /// Site facets in page order, keys unique. A labelled facet with no
    /// value text keeps its key with a null value.
    pub extra_fields: Vec<(String, Option<String>)>,
}

/// Text read off the rendered card, before structured metadata is merged in.
#[derive(Debug, Clone, Default)]
pub struct PageFields {
    pub id: String,
    pub title: String,
    pub price_raw: String,
    pub area_raw: String,
    pub locality: Option<String>,
    pub address: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub extra_fields: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingRequiredField(&'static str),
    ReadError(String),
}

impl SkipReason {
    pub fn tag(&self) -> &'static str {
        match self {
            SkipReason::MissingRequiredField(_) => "missing-required-field",
            SkipReason::ReadError(_) => "read-error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRequiredField(field) => write!(f, "{}: {}", self.tag(), field),
            SkipReason::ReadError(msg) => write!(f, "{}: {}", self.tag(), msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The candidate is dropped; the run goes on.
    #[error("{0}")]
    Skip(SkipReason),

    #[error(transparent)]
    Fatal(PageError),
}

impl From<PageError> for ExtractError {
    fn from(err: PageError) -> Self {
        if err.is_fatal() {
            ExtractError::Fatal(err)
        } else {
            ExtractError::Skip(SkipReason::ReadError(err.to_string()))
        }
    }
}

/// Build a record for one candidate whose listing id is already known.
pub async fn extract_candidate<P: Page + ?Sized>(
    page: &mut P,
    candidate: &Candidate,
    id: &str,
    selectors: &SiteSelectors,
    metadata: &Metadata,
) -> Result<Record, ExtractError> {
    let title = required(page, candidate, &selectors.title, "title").await?;
    let price_raw = required(page, candidate, &selectors.price, "price").await?;
    let area_raw = required(page, candidate, &selectors.area, "area").await?;

    let locality = optional(page.read_text(candidate, &selectors.locality).await)?
        .flatten()
        .as_deref()
        .and_then(normalize_whitespace);
    let address = optional(page.read_text(candidate, &selectors.address).await)?
        .flatten()
        .as_deref()
        .and_then(normalize_whitespace);

    let facets = optional(
        page.read_facets(candidate, &selectors.facet_item, &selectors.facet_label)
            .await,
    )?
    .unwrap_or_default();

    let fields = PageFields {
        id: id.to_string(),
        title,
        price_raw,
        area_raw,
        locality,
        address,
        url: None,
        category: None,
        extra_fields: facet_fields(facets),
    };

    Ok(merge_metadata(fields, metadata.get(id)))
}

async fn required<P: Page + ?Sized>(
    page: &mut P,
    candidate: &Candidate,
    selector: &str,
    field: &'static str,
) -> Result<String, ExtractError> {
    page.read_text(candidate, selector)
        .await?
        .as_deref()
        .and_then(normalize_whitespace)
        .ok_or(ExtractError::Skip(SkipReason::MissingRequiredField(field)))
}

/// Optional reads swallow element-level failures but not a lost session.
fn optional<T>(result: Result<T, PageError>) -> Result<Option<T>, ExtractError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_fatal() => Err(ExtractError::Fatal(e)),
        Err(e) => {
            debug!(error = %e, "Optional field unreadable");
            Ok(None)
        }
    }
}

/// Facet `(label, item text)` pairs → normalized key/value pairs. The value is
/// the item text with the label removed. First occurrence of a key wins.
fn facet_fields(raw: Vec<(String, String)>) -> Vec<(String, Option<String>)> {
    let mut out: Vec<(String, Option<String>)> = Vec::with_capacity(raw.len());
    for (label, text) in raw {
        let Some(key) = normalize_whitespace(&label) else {
            continue;
        };
        if out.iter().any(|(k, _)| *k == key) {
            continue;
        }
        let value = normalize_whitespace(&text.replace(&label, ""));
        out.push((key, value));
    }
    out
}

/// Combine card text with structured metadata. The card wins wherever it
/// supplied a value; metadata only fills `url` and `category` gaps.
pub fn merge_metadata(fields: PageFields, structured: Option<&ListingMeta>) -> Record {
    let meta_url = structured.and_then(|m| m.url.clone());
    let meta_category = structured
        .and_then(|m| m.name.as_deref())
        .and_then(category_from_name);

    Record {
        bedroom_count: parse_bedroom_count(&fields.title),
        price_value: parse_currency(&fields.price_raw),
        area_value: parse_area(&fields.area_raw),
        id: fields.id,
        title: Some(fields.title),
        price_raw: Some(fields.price_raw),
        area_raw: Some(fields.area_raw),
        locality: fields.locality,
        address: fields.address,
        url: fields.url.or(meta_url),
        category: fields.category.or(meta_category),
        extra_fields: fields.extra_fields,
    }
}

/// "Apartment for sale in Dwarka" → "Apartment".
fn category_from_name(name: &str) -> Option<String> {
    name.split_whitespace().next().map(str::to_string)
}
