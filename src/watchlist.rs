use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\^?[A-Za-z0-9][A-Za-z0-9.\-=^]*$").expect("valid symbol regex"));

#[derive(Debug, thiserror::Error)]
pub enum WatchlistError {
    #[error("failed to read watchlist {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("watchlist {path} has no `ticker` column")]
    MissingColumn { path: PathBuf },

    #[error("malformed ticker {symbol:?} on line {line}")]
    MalformedTicker { symbol: String, line: u64 },

    #[error("watchlist {path} contains no tickers")]
    Empty { path: PathBuf },
}

/// The fixed set of symbols watched for the whole process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchlist {
    tickers: Vec<String>,
}

impl Watchlist {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }
}

/// Reads the `ticker` column of a CSV file with a header row.
pub fn load(path: &Path) -> Result<Watchlist, WatchlistError> {
    let read_err = |source| WatchlistError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;

    let column = rdr
        .headers()
        .map_err(read_err)?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| WatchlistError::MissingColumn {
            path: path.to_path_buf(),
        })?;

    let mut tickers: Vec<String> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(read_err)?;
        let symbol = match record.get(column).map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };

        if !SYMBOL_RE.is_match(symbol) {
            let line = record.position().map_or(0, |p| p.line());
            return Err(WatchlistError::MalformedTicker {
                symbol: symbol.to_string(),
                line,
            });
        }

        if tickers.iter().any(|t| t == symbol) {
            warn!(ticker = symbol, "duplicate ticker in watchlist, keeping first");
            continue;
        }
        tickers.push(symbol.to_string());
    }

    if tickers.is_empty() {
        return Err(WatchlistError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!(count = tickers.len(), path = %path.display(), "watchlist loaded");
    Ok(Watchlist { tickers })
}

#[cfg(test)]
impl Watchlist {
    pub fn from_symbols(symbols: &[&str]) -> Self {
        Self {
            tickers: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tickers.csv");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_ticker_column_in_file_order() {
        let (_dir, path) = write_csv("ticker\nRELIANCE.NS\nAAPL\nTCS.NS\n");
        let list = load(&path).unwrap();
        assert_eq!(list.tickers(), ["RELIANCE.NS", "AAPL", "TCS.NS"]);
    }

    #[test]
    fn finds_ticker_column_among_others() {
        let (_dir, path) = write_csv("name,Ticker,exchange\nApple, AAPL ,NASDAQ\nIndex,^NSEI,NSE\n");
        let list = load(&path).unwrap();
        assert_eq!(list.tickers(), ["AAPL", "^NSEI"]);
    }

    #[test]
    fn skips_blanks_and_duplicates() {
        let (_dir, path) = write_csv("ticker\nMSFT\n\nMSFT\nGOOG\n");
        let list = load(&path).unwrap();
        assert_eq!(list.tickers(), ["MSFT", "GOOG"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn missing_column_is_an_error() {
        let (_dir, path) = write_csv("symbol\nAAPL\n");
        assert!(matches!(
            load(&path),
            Err(WatchlistError::MissingColumn { .. })
        ));
    }

    #[test]
    fn malformed_symbol_stops_loading() {
        let (_dir, path) = write_csv("ticker\nAAPL\nBAD TICKER\n");
        match load(&path) {
            Err(WatchlistError::MalformedTicker { symbol, line }) => {
                assert_eq!(symbol, "BAD TICKER");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_an_error() {
        let (_dir, path) = write_csv("ticker\n");
        assert!(matches!(load(&path), Err(WatchlistError::Empty { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(load(&path), Err(WatchlistError::Read { .. })));
    }
}
