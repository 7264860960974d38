use crate::storage_utils::LogConfig;
use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Supported log format types
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        }
    }
}

/// Installs the global subscriber. The terminal belongs to the dashboard, so
/// events are appended to `log_path` instead of stdout.
pub fn init_logger(config: &LogConfig, log_path: &Path) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("invalid log level {:?}: {e}", config.level))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    let format = LogFormat::from(config.format.as_str());
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install logger: {e}"))?;

    tracing::info!(%format, level = %config.level, "logger initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::from("json"), LogFormat::Json);
        assert_eq!(LogFormat::from("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from("plain"), LogFormat::Plain);
        assert_eq!(LogFormat::from("invalid"), LogFormat::Plain);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn invalid_level_is_rejected_before_touching_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashboard.log");
        let config = LogConfig {
            level: "stock_dashboard=loud".to_string(),
            ..LogConfig::default()
        };

        assert!(init_logger(&config, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn installed_logger_records_its_format_in_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashboard.log");
        let config = LogConfig {
            format: "json".to_string(),
            ..LogConfig::default()
        };

        init_logger(&config, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("logger initialized"));
        assert!(written.contains(r#""format":"json""#));
    }
}
