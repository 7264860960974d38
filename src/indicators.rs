use crate::prices::PriceBar;
use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// A price bar with its trailing moving averages attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub ticker: String,
    pub datetime: DateTime<FixedOffset>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
    pub ma20: f64,
    pub ma50: f64,
}

/// One cycle's enriched table, ordered by (ticker, datetime).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    rows: Vec<PriceObservation>,
}

impl Snapshot {
    pub fn rows(&self) -> &[PriceObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Sorts bars by (ticker, datetime) and attaches per-ticker SMAs of close.
///
/// Windows expand until they are full, so the first row of a ticker gets its
/// own close as both averages. Nothing outside `bars` is consulted.
pub fn add_moving_averages(
    mut bars: Vec<PriceBar>,
    short_window: usize,
    long_window: usize,
) -> Result<Snapshot> {
    bars.sort_by(|a, b| {
        a.ticker
            .cmp(&b.ticker)
            .then_with(|| a.datetime.cmp(&b.datetime))
    });

    let new_sma = |period: usize| {
        SimpleMovingAverage::new(period)
            .map_err(|e| anyhow!("invalid moving average window {period}: {e:?}"))
    };

    let mut short = new_sma(short_window)?;
    let mut long = new_sma(long_window)?;
    let mut rows = Vec::with_capacity(bars.len());
    let mut current: Option<String> = None;

    for bar in bars {
        if current.as_deref() != Some(bar.ticker.as_str()) {
            short = new_sma(short_window)?;
            long = new_sma(long_window)?;
            current = Some(bar.ticker.clone());
        }

        let ma20 = short.next(bar.close);
        let ma50 = long.next(bar.close);
        rows.push(PriceObservation {
            ticker: bar.ticker,
            datetime: bar.datetime,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ma20,
            ma50,
        });
    }

    Ok(Snapshot { rows })
}
