//! Application-level configuration loading: timing, scoring and storage settings.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::{
    dao::catalog_store::file::FileStoreConfig,
    services::scoring::{MAX_POINTS, MIN_POINTS, ScoreRules},
    state::engine::EngineSettings,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_LIVE_CONFIG_PATH";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_QUESTION_TIME_MS: u64 = 15_000;
const MIN_QUESTION_TIME_MS: u64 = 5_000;
const MAX_QUESTION_TIME_MS: u64 = 60_000;
const NEXT_DELAY: Duration = Duration::from_millis(1_800);
const CATALOG_TIMEOUT: Duration = Duration::from_millis(3_000);
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    port: u16,
    default_question_time_ms: u64,
    min_question_time_ms: u64,
    max_question_time_ms: u64,
    next_delay: Duration,
    score_rules: ScoreRules,
    catalog_timeout: Duration,
    data_dir: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        Self::load_from(&path)
    }

    /// Load the configuration stored at `path`.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        question_time_ms = app_config.default_question_time_ms,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Upper bound for a catalog read at game start.
    pub fn catalog_timeout(&self) -> Duration {
        self.catalog_timeout
    }

    /// Point bounds for correct answers.
    pub fn score_rules(&self) -> ScoreRules {
        self.score_rules
    }

    /// Settings handed to the session engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_question_time_ms: self.default_question_time_ms,
            min_question_time_ms: self.min_question_time_ms,
            max_question_time_ms: self.max_question_time_ms,
            next_delay: self.next_delay,
            score_rules: self.score_rules,
        }
    }

    /// Location of the flat-file question bank.
    pub fn file_store_config(&self) -> FileStoreConfig {
        FileStoreConfig::new(self.data_dir.clone())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            default_question_time_ms: DEFAULT_QUESTION_TIME_MS,
            min_question_time_ms: MIN_QUESTION_TIME_MS,
            max_question_time_ms: MAX_QUESTION_TIME_MS,
            next_delay: NEXT_DELAY,
            score_rules: ScoreRules::default(),
            catalog_timeout: CATALOG_TIMEOUT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    default_question_time_ms: Option<u64>,
    min_question_time_ms: Option<u64>,
    max_question_time_ms: Option<u64>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    next_delay_ms: Option<Duration>,
    max_points: Option<u32>,
    min_points: Option<u32>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    catalog_timeout_ms: Option<Duration>,
    data_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        let mut min_question_time_ms = value.min_question_time_ms.unwrap_or(MIN_QUESTION_TIME_MS);
        let mut max_question_time_ms = value.max_question_time_ms.unwrap_or(MAX_QUESTION_TIME_MS);
        if min_question_time_ms == 0 || min_question_time_ms > max_question_time_ms {
            warn!(
                min = min_question_time_ms,
                max = max_question_time_ms,
                "invalid question time bounds; using defaults"
            );
            min_question_time_ms = MIN_QUESTION_TIME_MS;
            max_question_time_ms = MAX_QUESTION_TIME_MS;
        }

        let default_question_time_ms = value
            .default_question_time_ms
            .unwrap_or(DEFAULT_QUESTION_TIME_MS)
            .clamp(min_question_time_ms, max_question_time_ms);

        let score_rules = ScoreRules::new(
            value.min_points.unwrap_or(MIN_POINTS),
            value.max_points.unwrap_or(MAX_POINTS),
        )
        .unwrap_or_else(|err| {
            warn!(error = %err, "invalid point bounds; using defaults");
            ScoreRules::default()
        });

        Self {
            port: value.port.unwrap_or(defaults.port),
            default_question_time_ms,
            min_question_time_ms,
            max_question_time_ms,
            next_delay: value.next_delay_ms.unwrap_or(defaults.next_delay),
            score_rules,
            catalog_timeout: value.catalog_timeout_ms.unwrap_or(defaults.catalog_timeout),
            data_dir: value.data_dir.unwrap_or(defaults.data_dir),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let config = parse("{}");
        let engine = config.engine_settings();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(engine.default_question_time_ms, 15_000);
        assert_eq!(engine.next_delay, Duration::from_millis(1_800));
        assert_eq!(config.catalog_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn durations_are_read_as_milliseconds() {
        let config = parse(r#"{"nextDelayMs": 2500, "catalogTimeoutMs": 750, "port": 8081}"#);
        assert_eq!(config.engine_settings().next_delay, Duration::from_millis(2_500));
        assert_eq!(config.catalog_timeout(), Duration::from_millis(750));
        assert_eq!(config.port(), 8081);
    }

    #[test]
    fn inverted_point_bounds_fall_back() {
        let config = parse(r#"{"minPoints": 900, "maxPoints": 100}"#);
        assert_eq!(config.score_rules(), ScoreRules::default());
    }

    #[test]
    fn default_time_is_clamped_into_bounds() {
        let config = parse(r#"{"defaultQuestionTimeMs": 90000}"#);
        assert_eq!(config.engine_settings().default_question_time_ms, 60_000);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here/app.json"));
        assert_eq!(config.port(), DEFAULT_PORT);
    }
}
