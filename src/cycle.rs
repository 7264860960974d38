//! The fetch → enrich → persist → present loop.

use crate::display::{CycleOutcome, CyclePhase, DisplaySink};
use crate::indicators;
use crate::prices::{FetchError, PriceSource};
use crate::ranking;
use crate::storage_utils::CycleConfig;
use crate::store::PriceStore;
use crate::watchlist::Watchlist;
use chrono::Local;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything a cycle needs, held for the lifetime of the process.
pub struct CycleContext {
    pub watchlist: Watchlist,
    pub source: Box<dyn PriceSource>,
    pub store: PriceStore,
    pub settings: CycleConfig,
}

pub struct CycleDriver<D: DisplaySink> {
    context: CycleContext,
    display: D,
}

type PhaseError = (CyclePhase, anyhow::Error);

impl<D: DisplaySink> CycleDriver<D> {
    pub fn new(context: CycleContext, display: D) -> Self {
        Self { context, display }
    }

    /// Runs cycles forever with a fixed pause after each one, whatever its result.
    pub async fn run(mut self) {
        let pause = Duration::from_secs(self.context.settings.interval_seconds);
        info!(
            tickers = self.context.watchlist.len(),
            interval_seconds = pause.as_secs(),
            "cycle driver started"
        );
        loop {
            let outcome = self.run_once().await;
            debug!(failed = outcome.is_failure(), "sleeping until next cycle");
            tokio::time::sleep(pause).await;
        }
    }

    /// One full pass. A failing phase skips the rest of the cycle and is
    /// reported to the display instead.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let outcome = match self.cycle().await {
            Ok(outcome) => outcome,
            Err((phase, err)) => {
                log_failure(phase, &err);
                CycleOutcome::Failed {
                    phase,
                    message: format!("{err:#}"),
                    finished_at: Local::now(),
                }
            }
        };

        if let Err(e) = self.display.show(&outcome).await {
            warn!("display did not accept cycle outcome: {e:#}");
        }
        outcome
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, PhaseError> {
        let settings = &self.context.settings;

        debug!(phase = %CyclePhase::Fetching, "entering phase");
        let bars = self
            .context
            .source
            .fetch(self.context.watchlist.tickers())
            .await
            .map_err(|e| (CyclePhase::Fetching, anyhow::Error::new(e)))?;

        debug!(phase = %CyclePhase::Enriching, rows = bars.len(), "entering phase");
        let snapshot =
            indicators::add_moving_averages(bars, settings.short_window, settings.long_window)
                .map_err(|e| (CyclePhase::Enriching, e))?;

        debug!(phase = %CyclePhase::Persisting, rows = snapshot.len(), "entering phase");
        let rows_persisted = self
            .context
            .store
            .append(&snapshot)
            .map_err(|e| (CyclePhase::Persisting, e))?;

        debug!(phase = %CyclePhase::Presenting, "entering phase");
        let view = ranking::top_stocks(&snapshot, settings.top_n);
        let alerts = ranking::alerts(&view);

        info!(
            rows_persisted,
            displayed = view.rows.len(),
            alerts = alerts.tickers.len(),
            "cycle completed"
        );
        Ok(CycleOutcome::Completed {
            view,
            alerts,
            rows_persisted,
            finished_at: Local::now(),
        })
    }
}

fn log_failure(phase: CyclePhase, err: &anyhow::Error) {
    match err.downcast_ref::<FetchError>() {
        Some(fetch) if fetch.is_unknown_symbol() => {
            warn!(ticker = fetch.symbol(), "cycle failed while {phase}: {err:#}")
        }
        _ => error!("cycle failed while {phase}: {err:#}"),
    }
}
