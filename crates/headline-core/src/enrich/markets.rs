use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::EnrichmentProvider;
use crate::{Error, Result};

pub(super) const API_KEY_ENV: &str = "CRYPTO_API_KEY";

const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

#[derive(Deserialize)]
struct PriceQuote {
    #[serde(rename = "USD")]
    usd: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceResponse {
    Error {
        #[serde(rename = "Response")]
        response: String,
        #[serde(rename = "Message", default)]
        message: String,
    },
    Quotes(HashMap<String, PriceQuote>),
}

/// Crypto spot prices in USD from CryptoCompare
pub struct MarketsProvider {
    client: Client,
    api_key: String,
    tickers: Vec<String>,
    base_url: String,
}

impl MarketsProvider {
    pub fn new(api_key: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            tickers,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn prices(&self) -> Result<HashMap<String, PriceQuote>> {
        let url = format!("{}/data/pricemulti", self.base_url);
        let symbols = self.tickers.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fsyms", symbols.as_str()),
                ("tsyms", "USD"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Price request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Enrichment(format!("Price API returned HTTP {}", status)));
        }

        let decoded: PriceResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("Failed to parse price response: {}", e)))?;

        match decoded {
            PriceResponse::Quotes(quotes) => Ok(quotes),
            PriceResponse::Error { response, message } => Err(Error::Enrichment(format!(
                "Price API {}: {}",
                response, message
            ))),
        }
    }
}

#[async_trait]
impl EnrichmentProvider for MarketsProvider {
    fn name(&self) -> &str {
        "markets"
    }

    async fn produce(&self) -> Result<Option<String>> {
        if self.tickers.is_empty() {
            return Ok(None);
        }

        let quotes = self.prices().await?;

        let mut html = String::from(r#"<div id="info"><h1>Markets</h1>"#);
        for ticker in &self.tickers {
            let quote = quotes
                .get(ticker)
                .ok_or_else(|| Error::Enrichment(format!("No price for {}", ticker)))?;
            html.push_str(&format!(
                r#"<span class="ticker">{} ${}</span>"#,
                ticker.to_lowercase(),
                quote.usd
            ));
        }
        html.push_str("</div>");

        Ok(Some(html))
    }
}
