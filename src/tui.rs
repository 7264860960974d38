use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::display::{CycleOutcome, PAGE_TITLE};
use crate::ranking::{AlertSet, TopStocksView};

// --- App State ---

/// What is on screen. A failed cycle keeps the last good table and adds an
/// error line; the next successful cycle clears it.
#[derive(Default)]
struct App {
    view: TopStocksView,
    alerts: AlertSet,
    rows_persisted: usize,
    last_updated: Option<DateTime<Local>>,
    error: Option<String>,
    cycles_seen: usize,
}

impl App {
    fn apply(&mut self, outcome: CycleOutcome) {
        self.cycles_seen += 1;
        self.error = outcome.error_line();
        if let CycleOutcome::Completed {
            view,
            alerts,
            rows_persisted,
            finished_at,
        } = outcome
        {
            self.view = view;
            self.alerts = alerts;
            self.rows_persisted = rows_persisted;
            self.last_updated = Some(finished_at);
        }
    }
}

// --- TUI ---

pub async fn run_tui(outcomes: mpsc::Receiver<CycleOutcome>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, outcomes).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut outcomes: mpsc::Receiver<CycleOutcome>,
) -> Result<()> {
    let mut app = App::default();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        while let Ok(outcome) = outcomes.try_recv() {
            app.apply(outcome);
        }

        if event::poll(Duration::from_millis(50))? {
            // Resize events need no handling; the next draw picks up the new size.
            if let Event::Key(key) = event::read()? {
                if is_quit(key) {
                    return Ok(());
                }
            }
        }
        tokio::task::yield_now().await;
    }
}

fn is_quit(key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Title + last update
        Constraint::Min(0),    // Top stocks
        Constraint::Length(3), // Alert / error line
        Constraint::Length(1), // Help
    ])
    .split(f.size());

    let updated = app
        .last_updated
        .map(|t| t.format("%d-%m-%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| "Never".to_string());
    f.render_widget(
        Paragraph::new(format!(
            "Last Updated: {}   Rows saved last cycle: {}",
            updated, app.rows_persisted
        ))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(PAGE_TITLE)
                .title_alignment(Alignment::Center),
        ),
        chunks[0],
    );

    let header = Row::new(["Rank", "Ticker", "Close", "MA20", "MA50"].map(Cell::from))
        .style(Style::default().bg(Color::DarkGray));

    let rows = app.view.rows.iter().enumerate().map(|(i, stock)| {
        let close_color = if stock.close > stock.ma50 {
            Color::Green
        } else {
            Color::Red
        };
        Row::new([
            Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
            Cell::from(stock.ticker.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(Line::from(format!("{:.2}", stock.close)))
                .style(Style::default().fg(close_color)),
            Cell::from(format!("{:.2}", stock.ma20)),
            Cell::from(format!("{:.2}", stock.ma50)),
        ])
        .height(1)
    });

    let table_title = if app.cycles_seen == 0 {
        "Waiting for first update...".to_string()
    } else {
        format!("Top {} Stocks by Latest Price", app.view.rows.len())
    };
    f.render_widget(
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(25),
                Constraint::Percentage(25),
                Constraint::Percentage(22),
                Constraint::Percentage(22),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(table_title)),
        chunks[1],
    );

    let (status, style) = status_line(app);
    f.render_widget(
        Paragraph::new(status)
            .style(style)
            .block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );

    f.render_widget(
        Paragraph::new("q quits").alignment(Alignment::Center),
        chunks[3],
    );
}

/// Error beats alerts; an empty line when there is neither.
fn status_line(app: &App) -> (String, Style) {
    if let Some(error) = &app.error {
        (error.clone(), Style::default().fg(Color::Red))
    } else if let Some(banner) = app.alerts.banner() {
        (format!("⚠ {}", banner), Style::default().fg(Color::Yellow))
    } else {
        (String::new(), Style::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::CyclePhase;
    use crate::ranking::TopStock;
    use ratatui::backend::TestBackend;

    fn completed(alerting: &[&str]) -> CycleOutcome {
        CycleOutcome::Completed {
            view: TopStocksView {
                rows: vec![TopStock {
                    ticker: "AAA".to_string(),
                    close: 12.0,
                    ma20: 11.0,
                    ma50: 11.0,
                }],
            },
            alerts: AlertSet {
                tickers: alerting.iter().map(|s| s.to_string()).collect(),
            },
            rows_persisted: 3,
            finished_at: Local::now(),
        }
    }

    fn failed() -> CycleOutcome {
        CycleOutcome::Failed {
            phase: CyclePhase::Fetching,
            message: "HTTP 503".to_string(),
            finished_at: Local::now(),
        }
    }

    #[test]
    fn failure_keeps_last_table_and_shows_error() {
        let mut app = App::default();
        app.apply(completed(&["AAA"]));
        app.apply(failed());

        assert_eq!(app.view.rows.len(), 1);
        let (status, _) = status_line(&app);
        assert_eq!(status, "Error while fetching prices: HTTP 503");
    }

    #[test]
    fn success_clears_previous_error() {
        let mut app = App::default();
        app.apply(failed());
        app.apply(completed(&["AAA"]));

        assert!(app.error.is_none());
        let (status, _) = status_line(&app);
        assert_eq!(status, "⚠ Stocks above MA50: AAA");
        assert_eq!(app.cycles_seen, 2);
    }

    #[test]
    fn no_alerts_means_empty_status() {
        let mut app = App::default();
        app.apply(completed(&[]));
        assert_eq!(status_line(&app).0, "");
    }

    #[test]
    fn quit_keys() {
        assert!(is_quit(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn draws_title_and_rows() {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let mut app = App::default();
        app.apply(completed(&["AAA"]));

        terminal.draw(|f| ui(f, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains(PAGE_TITLE));
        assert!(text.contains("AAA"));
        assert!(text.contains("12.00"));
    }
}
