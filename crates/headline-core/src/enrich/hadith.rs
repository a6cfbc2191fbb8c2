use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use super::EnrichmentProvider;
use crate::aggregate::escape_html;
use crate::{Error, Result};

pub(super) const API_KEY_ENV: &str = "SUNNAH_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.sunnah.com";

/// Collections sampled each cycle with their hadith counts
const BOOKS: &[(&str, u32)] = &[("bukhari", 7563), ("muslim", 3033)];

const TRIES_PER_BOOK: usize = 3;

#[derive(Deserialize)]
struct HadithResponse {
    hadith: Vec<HadithText>,
}

#[derive(Deserialize)]
struct HadithText {
    #[serde(rename = "chapterTitle", default)]
    chapter_title: String,
    body: String,
}

/// One random hadith from each collection via the sunnah.com API
pub struct HadithProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HadithProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, book: &str, number: u32) -> Result<HadithText> {
        let url = format!("{}/v1/collections/{}/hadiths/{}", self.base_url, book, number);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Hadith request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Enrichment(format!("Hadith API returned HTTP {}", status)));
        }

        let decoded: HadithResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("Failed to parse hadith response: {}", e)))?;

        decoded
            .hadith
            .into_iter()
            .next()
            .ok_or_else(|| Error::Enrichment(format!("Empty hadith {}:{}", book, number)))
    }
}

#[async_trait]
impl EnrichmentProvider for HadithProvider {
    fn name(&self) -> &str {
        "hadith"
    }

    async fn produce(&self) -> Result<Option<String>> {
        let mut quotes = Vec::with_capacity(BOOKS.len());
        let mut last_error = None;

        for &(book, limit) in BOOKS {
            for _ in 0..TRIES_PER_BOOK {
                let number = pick(limit);
                match self.fetch(book, number).await {
                    Ok(hadith) => {
                        quotes.push(format!(
                            r#"<div><b>{title}</b><br>{body}<a href="https://sunnah.com/{book}:{number}">{book}:{number}</a></div>"#,
                            title = escape_html(&hadith.chapter_title),
                            body = hadith.body,
                        ));
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(book, number, error = %e, "Hadith lookup failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        if quotes.is_empty() {
            return match last_error {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }

        Ok(Some(format!(
            r#"<div id="hadith"><h1>Hadith</h1>{}</div>"#,
            quotes.join("<br>")
        )))
    }
}

/// Random hadith number in `1..limit`
fn pick(limit: u32) -> u32 {
    let n = (Uuid::new_v4().as_u128() % u128::from(limit.max(1))) as u32;
    n.max(1)
}
