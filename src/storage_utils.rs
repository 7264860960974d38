use anyhow::{Context, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

// CONFIGURATION STRUCTS
// config.json deserializes straight into these; every field has a default
// so a partial file is enough.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String, // e.g., "https://query1.finance.yahoo.com"
    pub period: String,   // e.g., "1d"
    pub interval: String, // e.g., "1m"
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            period: "1d".to_string(),
            interval: "1m".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CycleConfig {
    pub interval_seconds: u64, // pause between two cycles
    pub top_n: usize,
    pub short_window: usize, // MA20
    pub long_window: usize,  // MA50
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            top_n: 20,
            short_window: 20,
            long_window: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String, // "plain" or "json"
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: "dashboard.log".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Tui,
    Plain,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub watchlist_file: String,
    pub database_file: String,
    pub display: DisplayMode,
    // Nested structs organize the config logically
    pub fetch: FetchConfig,
    pub cycle: CycleConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watchlist_file: "tickers.csv".to_string(),
            database_file: "stocks.db".to_string(),
            display: DisplayMode::default(),
            fetch: FetchConfig::default(),
            cycle: CycleConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `config.json` from storage, writing the defaults first if the
    /// file does not exist yet.
    pub async fn load_or_init(storage: &AsyncStorageManager) -> anyhow::Result<Self> {
        let config = if storage.exists("config").await {
            storage
                .load::<AppConfig>("config")
                .await
                .context("failed to read config.json")?
        } else {
            let config = AppConfig::default();
            storage.save("config", &config).await?;
            config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let cycle = &self.cycle;
        if cycle.short_window == 0 || cycle.long_window == 0 {
            bail!("moving average windows must be at least 1");
        }
        if cycle.top_n == 0 {
            bail!("top_n must be at least 1");
        }
        if cycle.interval_seconds == 0 {
            bail!("interval_seconds must be at least 1");
        }
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be at least 1");
        }
        if self.fetch.base_url.trim().is_empty() {
            bail!("fetch.base_url must not be empty");
        }
        Ok(())
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager rooted at `relative_path` next to the running
    /// executable, creating the directory on the way.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Resolves a config-supplied path: absolute paths pass through,
    /// relative ones land inside the storage directory.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub async fn exists(&self, filename: &str) -> bool {
        fs::try_exists(self.json_path(filename))
            .await
            .unwrap_or(false)
    }

    /// Serializes `data` to `<filename>.json`. Writes go through a `.tmp`
    /// file and a rename so a crash never leaves a half-written file.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.json_path(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json scans the bytes itself, so skip the UTF-8 pass of read_to_string.
        let content = fs::read(self.json_path(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    fn json_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }
}
