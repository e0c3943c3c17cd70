use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use common::{Error, RankCategory, RankedSymbolSource, Result, MAX_SCAN_SYMBOLS};

use crate::USER_AGENT;

const ACTIVES_URL: &str = "https://www.webull.com/quote/us/actives";
const OPTIONS_URL: &str = "https://www.webull.com/quote/us/options";

/// Top-N symbol lists scraped from the Webull US rankings pages.
pub struct WebullRanking {
    http: Client,
    limit: usize,
}

impl WebullRanking {
    pub fn new(limit: usize) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            limit: limit.min(MAX_SCAN_SYMBOLS),
        })
    }

    fn page_url(category: RankCategory) -> &'static str {
        match category {
            RankCategory::MostActive => ACTIVES_URL,
            RankCategory::Quality => OPTIONS_URL,
        }
    }
}

#[async_trait]
impl RankedSymbolSource for WebullRanking {
    async fn ranked_symbols(&self, category: RankCategory) -> Result<Vec<String>> {
        let url = Self::page_url(category);
        debug!(%category, %url, "Fetching ranking page");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let html = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {status} from {url}")));
        }

        parse_ranked_symbols(&html, self.limit)
    }
}

/// Extract ticker symbols from a rankings page, in page order.
pub fn parse_ranked_symbols(html: &str, limit: usize) -> Result<Vec<String>> {
    let row_selector = selector(".table-row.table-row-hover")?;
    let symbol_selector = selector(".detail .txt")?;

    let document = Html::parse_document(html);
    let symbols = document
        .select(&row_selector)
        .take(limit)
        .filter_map(|row| row.select(&symbol_selector).next())
        .map(|cell| cell.text().collect::<String>().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(symbols)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("bad selector '{css}': {e:?}")))
}
