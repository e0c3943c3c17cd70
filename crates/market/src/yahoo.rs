use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use common::{Bar, BarProvider, BarSeries, Error, Interval, Period, Result};

use crate::USER_AGENT;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// OHLCV bars from the Yahoo Finance chart API.
pub struct YahooClient {
    base_url: String,
    http: Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(CHART_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn chart_url(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| Error::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Parse(format!("cannot append path to '{}'", self.base_url)))?
            .push(symbol);

        {
            let mut query = url.query_pairs_mut();
            match period {
                // The chart API has no sub-day range, so the hour is spelled out.
                Period::LastHour => {
                    let end = now.timestamp();
                    query.append_pair("period1", &(end - 3600).to_string());
                    query.append_pair("period2", &end.to_string());
                }
                Period::Day | Period::Year => {
                    query.append_pair("range", &period.to_string());
                }
            }
            query.append_pair("interval", &interval.to_string());
        }

        Ok(url)
    }
}

#[async_trait]
impl BarProvider for YahooClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<BarSeries> {
        let url = self.chart_url(symbol, period, interval, Utc::now())?;
        debug!(%symbol, %period, %interval, "Fetching bars from Yahoo");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Ok(BarSeries::empty(symbol));
        }
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {status}: {body}")));
        }

        parse_chart(symbol, &body)
    }
}

/// Turn a chart API response body into a bar series.
///
/// Rows with any missing OHLCV field are dropped. A "Not Found" error
/// payload yields an empty series.
pub fn parse_chart(symbol: &str, body: &str) -> Result<BarSeries> {
    let resp: ChartResponse = serde_json::from_str(body)?;

    if let Some(err) = resp.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(BarSeries::empty(symbol));
        }
        return Err(Error::Provider(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(BarSeries::empty(symbol));
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(BarSeries::empty(symbol));
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let field = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(Bar {
                timestamp: DateTime::from_timestamp(ts, 0)?,
                open: field(&opens, i)?,
                high: field(&highs, i)?,
                low: field(&lows, i)?,
                close: field(&closes, i)?,
                volume: field(&volumes, i).filter(|v| *v >= 0.0)? as u64,
            })
        })
        .collect();

    Ok(BarSeries::new(symbol, bars))
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1709303400, 1709303700, 1709304000],
                "indicators": {
                    "quote": [{
                        "open":   [10.0, 10.5, null],
                        "high":   [11.0, 10.9, 10.4],
                        "low":    [9.5, 10.1, 10.0],
                        "close":  [10.5, 10.2, 10.3],
                        "volume": [1200, 3400, 500]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_rows_and_drops_incomplete_ones() {
        let series = parse_chart("XYZ", SAMPLE).unwrap();
        assert_eq!(series.symbol(), "XYZ");
        assert_eq!(series.len(), 2);

        let first = series.get(0).unwrap();
        assert_eq!(first.timestamp, Utc.timestamp_opt(1709303400, 0).unwrap());
        assert_eq!(first.volume, 1200);
        assert_eq!(series.get(1).unwrap().close, 10.2);
    }

    #[test]
    fn not_found_payload_is_empty_series() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let series = parse_chart("NOPE", body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn other_error_payload_is_an_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(parse_chart("XYZ", body), Err(Error::Provider(_))));
    }

    #[test]
    fn last_hour_url_spells_out_the_window() {
        let client = YahooClient::new().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        let url = client
            .chart_url("AAPL", Period::LastHour, Interval::FiveMinutes, now)
            .unwrap();

        assert!(url.path().ends_with("/chart/AAPL"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let end = now.timestamp();
        assert!(pairs.contains(&("period1".into(), (end - 3600).to_string())));
        assert!(pairs.contains(&("period2".into(), end.to_string())));
        assert!(pairs.contains(&("interval".into(), "5m".into())));
    }

    #[test]
    fn yearly_url_uses_range() {
        let client = YahooClient::new().unwrap();
        let url = client
            .chart_url("MSFT", Period::Year, Interval::Daily, Utc::now())
            .unwrap();
        assert_eq!(url.query(), Some("range=1y&interval=1d"));
    }
}
