//! Scraper for the uittrekselregister.nl search page.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use livestock_map_building_models::RegistryEntry;
use livestock_map_http::{HttpError, RetryPolicy, build_client, retry};
use scraper::{ElementRef, Html, Selector};

use crate::{RegistryError, RegistryLookup};

/// Public search endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://www.uittrekselregister.nl";

static RESULT_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[class="result-block"]"#).unwrap_or_else(|_| unreachable!())
});
static DETAIL_LABEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[class*="detail-block mt-4"] > div"#).unwrap_or_else(|_| unreachable!())
});
static INACTIVE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[class*="inactive"]"#).unwrap_or_else(|_| unreachable!())
});

const DESCRIPTION_LABEL: &str = "Omschrijving:";

/// [`RegistryLookup`] backed by the uittrekselregister.nl search page.
#[derive(Debug, Clone)]
pub struct UittrekselRegisterClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl UittrekselRegisterClient {
    /// Creates a client against the public site.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client against another host serving the same pages.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_retries: 2,
                ..RetryPolicy::default()
            },
        })
    }
}

#[async_trait]
impl RegistryLookup for UittrekselRegisterClient {
    async fn lookup(&self, address: &str) -> Result<Vec<RegistryEntry>, RegistryError> {
        let url = format!("{}/zoekresultaten", self.base_url);
        let html = retry::send_text(&self.retry, || {
            self.client.get(&url).query(&[("q", address)])
        })
        .await?;

        let entries = parse_results(&html);
        log::debug!("{} registry entries for '{address}'", entries.len());
        Ok(entries)
    }
}

/// Extracts the registry entries from a search results page. Entries
/// without a description are dropped.
#[must_use]
pub fn parse_results(html: &str) -> Vec<RegistryEntry> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT_BLOCK)
        .filter_map(|block| {
            let description = description(block);
            if description.is_empty() {
                log::debug!("Skipping registry result without description");
                return None;
            }
            let active = block.select(&INACTIVE).next().is_none();
            Some(RegistryEntry {
                description,
                active,
            })
        })
        .collect()
}

/// Text of the `span.value-column` following the "Omschrijving:" label.
fn description(block: ElementRef<'_>) -> String {
    block
        .select(&DETAIL_LABEL)
        .filter(|label| label.text().any(|t| t.contains(DESCRIPTION_LABEL)))
        .find_map(|label| {
            label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| {
                    sibling.value().name() == "span"
                        && sibling.value().classes().any(|c| c == "value-column")
                })
        })
        .map(|value| value.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
