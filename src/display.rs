use crate::ranking::{AlertSet, TopStocksView};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use tokio::sync::mpsc;

pub const PAGE_TITLE: &str = "Real-Time Stock Market Dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Fetching,
    Enriching,
    Persisting,
    Presenting,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Fetching => write!(f, "fetching prices"),
            CyclePhase::Enriching => write!(f, "computing moving averages"),
            CyclePhase::Persisting => write!(f, "saving prices"),
            CyclePhase::Presenting => write!(f, "ranking stocks"),
        }
    }
}

/// What a single cycle hands to the display.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed {
        view: TopStocksView,
        alerts: AlertSet,
        rows_persisted: usize,
        finished_at: DateTime<Local>,
    },
    Failed {
        phase: CyclePhase,
        message: String,
        finished_at: DateTime<Local>,
    },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }

    /// Error line shown for a failed cycle.
    pub fn error_line(&self) -> Option<String> {
        match self {
            CycleOutcome::Failed { phase, message, .. } => {
                Some(format!("Error while {phase}: {message}"))
            }
            CycleOutcome::Completed { .. } => None,
        }
    }
}

#[async_trait]
pub trait DisplaySink: Send {
    async fn show(&mut self, outcome: &CycleOutcome) -> anyhow::Result<()>;
}

/// Forwards outcomes to the terminal UI, which owns the screen.
pub struct ChannelDisplay {
    tx: mpsc::Sender<CycleOutcome>,
}

impl ChannelDisplay {
    pub fn new(tx: mpsc::Sender<CycleOutcome>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DisplaySink for ChannelDisplay {
    async fn show(&mut self, outcome: &CycleOutcome) -> anyhow::Result<()> {
        self.tx
            .send(outcome.clone())
            .await
            .map_err(|_| anyhow::anyhow!("display closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_names_the_phase() {
        let outcome = CycleOutcome::Failed {
            phase: CyclePhase::Fetching,
            message: "connection refused".to_string(),
            finished_at: Local::now(),
        };
        assert!(outcome.is_failure());
        assert_eq!(
            outcome.error_line().as_deref(),
            Some("Error while fetching prices: connection refused")
        );
    }

    #[tokio::test]
    async fn channel_display_forwards_outcomes() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut display = ChannelDisplay::new(tx);
        let outcome = CycleOutcome::Completed {
            view: TopStocksView::default(),
            alerts: AlertSet::default(),
            rows_persisted: 3,
            finished_at: Local::now(),
        };

        display.show(&outcome).await.unwrap();
        assert_eq!(rx.recv().await, Some(outcome));
    }

    #[tokio::test]
    async fn channel_display_errors_once_ui_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut display = ChannelDisplay::new(tx);
        let outcome = CycleOutcome::Failed {
            phase: CyclePhase::Persisting,
            message: "disk full".to_string(),
            finished_at: Local::now(),
        };
        assert!(display.show(&outcome).await.is_err());
    }
}
