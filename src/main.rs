mod cycle;
mod display;
mod indicators;
mod logger;
mod plain_display;
mod prices;
mod ranking;
mod storage_utils;
mod store;
mod tui;
mod watchlist;

use anyhow::Context;
use cycle::{CycleContext, CycleDriver};
use display::ChannelDisplay;
use plain_display::PlainDisplay;
use prices::YahooPriceSource;
use storage_utils::{AppConfig, AsyncStorageManager, DisplayMode};
use store::PriceStore;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Step 1: Storage, config and logging
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config = AppConfig::load_or_init(&storage).await?;
    logger::init_logger(&config.log, &storage.resolve(&config.log.file))?;
    info!(storage = %storage.base_dir.display(), "starting stock dashboard");

    // Step 2: Watchlist, store and price source
    let watchlist = watchlist::load(&storage.resolve(&config.watchlist_file))
        .context("failed to load watchlist")?;
    let store = PriceStore::open(storage.resolve(&config.database_file))?;
    info!(rows = store.row_count()?, "price store ready");
    let source = YahooPriceSource::new(&config.fetch)?;

    let context = CycleContext {
        watchlist,
        source: Box::new(source),
        store,
        settings: config.cycle.clone(),
    };

    // Step 3: Run cycles until the process is stopped
    match config.display {
        DisplayMode::Plain => CycleDriver::new(context, PlainDisplay::default()).run().await,
        DisplayMode::Tui => {
            let (tx, rx) = mpsc::channel(1);
            let driver = tokio::spawn(CycleDriver::new(context, ChannelDisplay::new(tx)).run());

            let res = tui::run_tui(rx).await;
            driver.abort();
            info!("dashboard closed");
            res?;
        }
    }

    Ok(())
}
