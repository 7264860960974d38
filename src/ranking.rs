use crate::indicators::Snapshot;

/// One displayed row: the latest observation of a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TopStock {
    pub ticker: String,
    pub close: f64,
    pub ma20: f64,
    pub ma50: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopStocksView {
    pub rows: Vec<TopStock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSet {
    pub tickers: Vec<String>,
}

impl AlertSet {
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Warning line for the display, `None` when nothing alerts.
    pub fn banner(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(format!("Stocks above MA50: {}", self.tickers.join(", ")))
        }
    }
}

/// Latest row per ticker, highest close first, at most `limit` rows.
///
/// Relies on the snapshot's (ticker, datetime) order; the sort is stable so
/// equal closes keep that ticker order.
pub fn top_stocks(snapshot: &Snapshot, limit: usize) -> TopStocksView {
    let rows = snapshot.rows();
    let mut latest: Vec<TopStock> = rows
        .iter()
        .enumerate()
        .filter(|(i, row)| rows.get(i + 1).is_none_or(|next| next.ticker != row.ticker))
        .map(|(_, row)| TopStock {
            ticker: row.ticker.clone(),
            close: row.close,
            ma20: row.ma20,
            ma50: row.ma50,
        })
        .collect();

    latest.sort_by(|a, b| b.close.total_cmp(&a.close));
    latest.truncate(limit);

    TopStocksView { rows: latest }
}

/// Tickers of the view whose close is strictly above their MA50.
pub fn alerts(view: &TopStocksView) -> AlertSet {
    AlertSet {
        tickers: view
            .rows
            .iter()
            .filter(|r| r.close > r.ma50)
            .map(|r| r.ticker.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::add_moving_averages;
    use crate::indicators::tests::bar;
    use crate::prices::PriceBar;

    fn series(ticker: &str, closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(ticker, i as i64, c))
            .collect()
    }

    #[test]
    fn two_ticker_scenario() {
        let mut bars = series("AAA", &[10.0, 11.0, 12.0]);
        bars.extend(series("BBB", &[5.0, 5.0, 5.0]));
        let snapshot = add_moving_averages(bars, 20, 50).unwrap();

        let view = top_stocks(&snapshot, 20);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].ticker, "AAA");
        assert_eq!(view.rows[0].close, 12.0);
        assert_eq!(view.rows[0].ma20, 11.0);
        assert_eq!(view.rows[0].ma50, 11.0);
        assert_eq!(view.rows[1].ticker, "BBB");

        let alerts = alerts(&view);
        assert_eq!(alerts.tickers, ["AAA"]);
        assert_eq!(alerts.banner().as_deref(), Some("Stocks above MA50: AAA"));
    }

    #[test]
    fn flat_series_does_not_alert() {
        let snapshot = add_moving_averages(series("BBB", &[5.0, 5.0, 5.0]), 20, 50).unwrap();
        let alerts = alerts(&top_stocks(&snapshot, 20));
        assert!(alerts.is_empty());
        assert_eq!(alerts.banner(), None);
    }

    #[test]
    fn view_holds_latest_row_of_each_ticker() {
        let mut bars = series("AAA", &[50.0, 1.0]);
        bars.extend(series("BBB", &[2.0]));
        let snapshot = add_moving_averages(bars, 20, 50).unwrap();

        let view = top_stocks(&snapshot, 20);
        let tickers: Vec<&str> = view.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, ["BBB", "AAA"]);
        assert_eq!(view.rows[1].close, 1.0);
    }

    #[test]
    fn view_is_truncated_and_descending() {
        let bars: Vec<PriceBar> = (0..30)
            .flat_map(|i| series(&format!("T{i:02}"), &[i as f64, (i * 7 % 13) as f64]))
            .collect();
        let snapshot = add_moving_averages(bars, 20, 50).unwrap();

        let view = top_stocks(&snapshot, 20);
        assert_eq!(view.rows.len(), 20);
        assert!(view.rows.windows(2).all(|w| w[0].close >= w[1].close));

        let mut tickers: Vec<&str> = view.rows.iter().map(|r| r.ticker.as_str()).collect();
        tickers.sort();
        tickers.dedup();
        assert_eq!(tickers.len(), 20);
    }

    #[test]
    fn equal_closes_keep_ticker_order() {
        let mut bars = series("CCC", &[7.0]);
        bars.extend(series("AAA", &[7.0]));
        bars.extend(series("BBB", &[9.0]));
        let snapshot = add_moving_averages(bars, 20, 50).unwrap();

        let view = top_stocks(&snapshot, 20);
        let tickers: Vec<&str> = view.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, ["BBB", "AAA", "CCC"]);
    }

    #[test]
    fn alerts_only_consider_displayed_rows() {
        // LOW rises above its average but is cut from a one-row view.
        let mut bars = series("HIGH", &[100.0, 100.0]);
        bars.extend(series("LOW", &[1.0, 2.0]));
        let snapshot = add_moving_averages(bars, 20, 50).unwrap();

        let view = top_stocks(&snapshot, 1);
        assert_eq!(view.rows.len(), 1);
        assert!(alerts(&view).is_empty());
        assert_eq!(alerts(&top_stocks(&snapshot, 2)).tickers, ["LOW"]);
    }

    #[test]
    fn empty_snapshot_gives_empty_view() {
        let view = top_stocks(&Snapshot::default(), 20);
        assert!(view.rows.is_empty());
        assert!(alerts(&view).is_empty());
    }
}
