use crate::display::{CycleOutcome, DisplaySink, PAGE_TITLE};
use crate::ranking::TopStocksView;
use anyhow::Result;
use async_trait::async_trait;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

fn get_visibility_ratio(close: f64, top_close: f64) -> f64 {
    if top_close <= 0.0 {
        1.0
    } else {
        (0.4 + 0.6 * (close / top_close)).max(0.4)
    }
}

pub fn build_table(view: &TopStocksView) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Ticker").add_attribute(Attribute::Bold),
            Cell::new("Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("MA20")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("MA50")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    let top_close = view.rows.first().map_or(1.0, |r| r.close);

    for (i, stock) in view.rows.iter().enumerate() {
        let ratio = get_visibility_ratio(stock.close, top_close);
        let cyan_val = (255.0 * ratio) as u8;
        let gray_val = (150.0 * ratio) as u8;
        // Green above the long average, red at or below it.
        let close_color = if stock.close > stock.ma50 {
            Color::Rgb { r: 0, g: cyan_val, b: 0 }
        } else {
            Color::Rgb { r: cyan_val, g: 0, b: 0 }
        };
        let average = |value: f64| {
            Cell::new(format!("{:.2}", value))
                .fg(Color::Rgb {
                    r: gray_val,
                    g: gray_val,
                    b: gray_val,
                })
                .set_alignment(CellAlignment::Right)
        };

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&stock.ticker).fg(Color::Rgb {
                r: 0,
                g: cyan_val,
                b: cyan_val,
            }),
            Cell::new(format!("{:.2}", stock.close))
                .fg(close_color)
                .set_alignment(CellAlignment::Right),
            average(stock.ma20),
            average(stock.ma50),
        ]);
    }

    table
}

fn push_completed(out: &mut String, completed: &CycleOutcome) {
    if let CycleOutcome::Completed {
        view,
        alerts,
        finished_at,
        ..
    } = completed
    {
        out.push_str(&format!(
            "Top {} Stocks by Latest Price (updated {})\n{}\n",
            view.rows.len(),
            finished_at.format("%d-%m-%Y %H:%M:%S"),
            build_table(view)
        ));
        if let Some(banner) = alerts.banner() {
            out.push_str(&format!("\n⚠ {}\n", banner));
        }
    }
}

/// Full text of one refresh in plain mode. A failed cycle repeats the last
/// good table and adds the error line under it.
pub fn render(outcome: &CycleOutcome, last_good: Option<&CycleOutcome>) -> String {
    let mut out = format!("{}\n\n", PAGE_TITLE);
    match outcome {
        CycleOutcome::Completed { .. } => push_completed(&mut out, outcome),
        CycleOutcome::Failed { .. } => {
            if let Some(good) = last_good {
                push_completed(&mut out, good);
                out.push('\n');
            }
            if let Some(line) = outcome.error_line() {
                out.push_str(&format!("{}\n", line));
            }
        }
    }
    out
}

/// Clears the terminal and prints the latest view every cycle.
#[derive(Default)]
pub struct PlainDisplay {
    last_completed: Option<CycleOutcome>,
}

impl PlainDisplay {
    fn frame(&mut self, outcome: &CycleOutcome) -> String {
        if !outcome.is_failure() {
            self.last_completed = Some(outcome.clone());
        }
        render(outcome, self.last_completed.as_ref())
    }
}

#[async_trait]
impl DisplaySink for PlainDisplay {
    async fn show(&mut self, outcome: &CycleOutcome) -> Result<()> {
        let text = self.frame(outcome);
        clearscreen::clear()?;
        println!("{}", text);
        Ok(())
    }
}
