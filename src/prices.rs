use crate::storage_utils::FetchConfig;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One normalized upstream minute bar, before indicators are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub ticker: String,
    pub datetime: DateTime<FixedOffset>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for {symbol} failed: {source}")]
    Transport {
        symbol: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned HTTP {status} for {symbol}")]
    Status { symbol: String, status: StatusCode },

    #[error("upstream rejected {symbol}: {code}: {description}")]
    Upstream {
        symbol: String,
        code: String,
        description: String,
    },

    #[error("malformed response for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },
}

impl FetchError {
    /// True when the provider says the symbol does not exist (or is delisted),
    /// as opposed to a network or provider hiccup.
    pub fn is_unknown_symbol(&self) -> bool {
        matches!(self, FetchError::Upstream { code, .. } if code.eq_ignore_ascii_case("Not Found"))
    }

    pub fn symbol(&self) -> &str {
        match self {
            FetchError::Transport { symbol, .. }
            | FetchError::Status { symbol, .. }
            | FetchError::Upstream { symbol, .. }
            | FetchError::Malformed { symbol, .. } => symbol,
        }
    }
}

/// Source of minute bars for a set of symbols. The result is always a flat
/// list of rows carrying their own ticker, however many symbols were asked for.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, tickers: &[String]) -> Result<Vec<PriceBar>, FetchError>;
}

// --- Yahoo chart payload ---

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug, Default)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turns one chart response body into rows for `symbol`.
fn parse_chart(symbol: &str, body: &[u8]) -> Result<Vec<PriceBar>, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        symbol: symbol.to_string(),
        reason,
    };

    let envelope: ChartEnvelope =
        serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;

    if let Some(err) = envelope.chart.error {
        return Err(FetchError::Upstream {
            symbol: symbol.to_string(),
            code: err.code,
            description: err.description,
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| malformed("empty result".to_string()))?;

    // No timestamp index means nothing traded yet in the period.
    let timestamps = match result.timestamp {
        Some(ts) => ts,
        None => return Ok(Vec::new()),
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    if quote.close.len() != timestamps.len() {
        return Err(malformed(format!(
            "{} timestamps but {} closes",
            timestamps.len(),
            quote.close.len()
        )));
    }

    let offset = FixedOffset::east_opt(result.meta.gmtoffset)
        .ok_or_else(|| malformed(format!("invalid gmtoffset {}", result.meta.gmtoffset)))?;
    let field = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(close) = quote.close[i] else {
            continue;
        };
        let datetime = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| malformed(format!("timestamp {ts} out of range")))?
            .with_timezone(&offset);

        bars.push(PriceBar {
            ticker: symbol.to_string(),
            datetime,
            open: field(&quote.open, i),
            high: field(&quote.high, i),
            low: field(&quote.low, i),
            close,
            volume: field(&quote.volume, i).map(|v| v as i64),
        });
    }

    Ok(bars)
}

// --- HTTP source ---

pub struct YahooPriceSource {
    client: Client,
    base_url: String,
    period: String,
    interval: String,
}

impl YahooPriceSource {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        // The chart endpoint throttles requests without a browser-like agent.
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) stock-dashboard")
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(50)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            period: config.period.clone(),
            interval: config.interval.clone(),
        })
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<Vec<PriceBar>, FetchError> {
        let transport = |source| FetchError::Transport {
            symbol: symbol.to_string(),
            source,
        };

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let response = self
            .client
            .get(url)
            .query(&[("range", self.period.as_str()), ("interval", self.interval.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        let bars = classify(symbol, status, &body)?;
        debug!(symbol, rows = bars.len(), "fetched bars");
        Ok(bars)
    }
}

/// Turns one chart response into rows or the error it stands for. Error
/// statuses usually still carry a chart.error payload worth surfacing, so
/// that payload wins over the bare status.
fn classify(symbol: &str, status: StatusCode, body: &[u8]) -> Result<Vec<PriceBar>, FetchError> {
    let parsed = parse_chart(symbol, body);
    if status.is_success() {
        return parsed;
    }
    match parsed {
        Err(err @ FetchError::Upstream { .. }) => Err(err),
        _ => Err(FetchError::Status {
            symbol: symbol.to_string(),
            status,
        }),
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn fetch(&self, tickers: &[String]) -> Result<Vec<PriceBar>, FetchError> {
        let tasks: Vec<_> = tickers.iter().map(|t| self.fetch_symbol(t)).collect();
        let results = futures::future::join_all(tasks).await;

        let mut all_bars = Vec::new();
        for result in results {
            all_bars.extend(result?);
        }
        Ok(all_bars)
    }
}
