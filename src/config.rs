//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.serpbeat.toml` files.

use crate::cli::{Args, Command, FetchArgs, StoreArgs};
use crate::fetcher::FetchOptions;
use crate::report::chart::{DEFAULT_FRAME_WARNING_THRESHOLD, DEFAULT_PLOTLY_JS_URL};
use crate::schedule::{parse_duration, FixedLoop, Schedule};
use crate::search::ClientConfig;
use crate::storage::BatchStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".serpbeat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Batch file settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Recurring fetch settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Chart settings.
    #[serde(default)]
    pub chart: ChartConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Custom Search JSON API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key. Prefer SERPBEAT_API_KEY over storing it here.
    #[serde(default)]
    pub api_key: String,

    /// Programmable search engine id. Prefer SERPBEAT_CSE_ID.
    #[serde(default)]
    pub cse_id: String,

    /// Results per query (1-100).
    #[serde(default = "default_results_per_query")]
    pub results_per_query: u32,

    /// Country restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gl: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            cse_id: String::new(),
            results_per_query: default_results_per_query(),
            gl: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    ClientConfig::default().endpoint
}

fn default_results_per_query() -> u32 {
    10
}

fn default_timeout() -> u64 {
    30
}

/// Batch file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory batch files are written to.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// File name prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Glob for aggregation. Derived from `dir` and `prefix` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            prefix: default_prefix(),
            pattern: None,
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_prefix() -> String {
    "serp".to_string()
}

/// Recurring fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval (`30m`) or `daily@HH:MM`.
    #[serde(default = "default_every")]
    pub every: String,

    /// Stop after this many runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u64>,

    /// How often the scheduler checks for a due run.
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Iterations of the fixed loop.
    #[serde(default = "default_loop_iterations")]
    pub loop_iterations: u64,

    /// Pause after each fixed-loop iteration.
    #[serde(default = "default_loop_sleep")]
    pub loop_sleep: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            every: default_every(),
            max_runs: None,
            poll_seconds: default_poll_seconds(),
            loop_iterations: default_loop_iterations(),
            loop_sleep: default_loop_sleep(),
        }
    }
}

fn default_every() -> String {
    "30m".to_string()
}

fn default_poll_seconds() -> u64 {
    1
}

fn default_loop_iterations() -> u64 {
    99
}

fn default_loop_sleep() -> String {
    "1s".to_string()
}

/// Chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Default chart output file.
    #[serde(default = "default_chart_output")]
    pub output: PathBuf,

    /// Where the chart page loads plotly.js from.
    #[serde(default = "default_plotly_js_url")]
    pub plotly_js_url: String,

    /// Warn when frames × facets exceeds this.
    #[serde(default = "default_frame_warning_threshold")]
    pub frame_warning_threshold: usize,

    /// Domains kept by the top-domains preset and the stats report.
    #[serde(default = "default_top_domains")]
    pub top_domains: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output: default_chart_output(),
            plotly_js_url: default_plotly_js_url(),
            frame_warning_threshold: default_frame_warning_threshold(),
            top_domains: default_top_domains(),
        }
    }
}

fn default_chart_output() -> PathBuf {
    PathBuf::from("serp_chart.html")
}

fn default_plotly_js_url() -> String {
    DEFAULT_PLOTLY_JS_URL.to_string()
}

fn default_frame_warning_threshold() -> usize {
    DEFAULT_FRAME_WARNING_THRESHOLD
}

fn default_top_domains() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Credentials
    /// from the environment arrive through the same arguments.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref key) = args.api_key {
            self.api.api_key = key.clone();
        }
        if let Some(ref cse_id) = args.cse_id {
            self.api.cse_id = cse_id.clone();
        }
        if let Some(ref endpoint) = args.endpoint {
            self.api.endpoint = endpoint.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        match args.command {
            Some(Command::Fetch(ref fetch)) => self.merge_fetch(fetch),
            Some(Command::Schedule {
                ref fetch,
                ref every,
                max_runs,
                poll_secs,
            }) => {
                self.merge_fetch(fetch);
                if let Some(every) = every {
                    self.schedule.every = every.clone();
                }
                if max_runs.is_some() {
                    self.schedule.max_runs = max_runs;
                }
                if let Some(poll) = poll_secs {
                    self.schedule.poll_seconds = poll;
                }
            }
            Some(Command::Loop {
                ref fetch,
                iterations,
                ref sleep,
            }) => {
                self.merge_fetch(fetch);
                if let Some(iterations) = iterations {
                    self.schedule.loop_iterations = iterations;
                }
                if let Some(sleep) = sleep {
                    self.schedule.loop_sleep = sleep.clone();
                }
            }
            Some(Command::Explore { ref store, .. }) => self.merge_store(store),
            _ => {}
        }
    }

    fn merge_fetch(&mut self, fetch: &FetchArgs) {
        self.merge_store(&fetch.store);
        if let Some(num) = fetch.num {
            self.api.results_per_query = num;
        }
        if fetch.gl.is_some() {
            self.api.gl = fetch.gl.clone();
        }
    }

    fn merge_store(&mut self, store: &StoreArgs) {
        if let Some(ref dir) = store.dir {
            self.storage.dir = dir.clone();
        }
        if let Some(ref prefix) = store.prefix {
            self.storage.prefix = prefix.clone();
        }
    }

    /// Where fetched batches go.
    pub fn batch_store(&self) -> BatchStore {
        BatchStore::new(self.storage.dir.clone(), self.storage.prefix.clone())
    }

    /// The aggregation glob: explicit `pattern`, or every batch the store writes.
    pub fn pattern(&self) -> String {
        self.storage
            .pattern
            .clone()
            .unwrap_or_else(|| self.batch_store().pattern())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.api.endpoint.clone(),
            api_key: self.api.api_key.clone(),
            cse_id: self.api.cse_id.clone(),
            timeout_seconds: self.api.timeout_seconds,
        }
    }

    pub fn fetch_options(&self, show_progress: bool) -> FetchOptions {
        FetchOptions {
            results_per_query: self.api.results_per_query,
            gl: self.api.gl.clone(),
            show_progress,
        }
    }

    pub fn schedule(&self) -> Result<Schedule> {
        self.schedule
            .every
            .parse()
            .with_context(|| format!("Invalid schedule `{}`", self.schedule.every))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_seconds.max(1))
    }

    pub fn fixed_loop(&self) -> Result<FixedLoop> {
        let sleep = parse_duration(&self.schedule.loop_sleep)
            .with_context(|| format!("Invalid loop sleep `{}`", self.schedule.loop_sleep))?;
        Ok(FixedLoop {
            iterations: self.schedule.loop_iterations,
            sleep,
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.results_per_query, 10);
        assert_eq!(config.api.timeout_seconds, 30);
        assert!(config.api.api_key.is_empty());
        assert_eq!(config.storage.prefix, "serp");
        assert_eq!(config.schedule.every, "30m");
        assert_eq!(config.schedule.loop_iterations, 99);
        assert_eq!(config.chart.top_domains, 10);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[api]
results_per_query = 30
gl = "us"

[storage]
dir = "snapshots"
prefix = "str"

[schedule]
every = "daily@13:25"
max_runs = 5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.api.results_per_query, 30);
        assert_eq!(config.api.gl.as_deref(), Some("us"));
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.storage.prefix, "str");
        assert_eq!(config.schedule.max_runs, Some(5));
        assert!(matches!(config.schedule().unwrap(), Schedule::DailyAt(_)));
        assert!(config
            .pattern()
            .ends_with("str*_scheduled_serp.csv"));
    }

    #[test]
    fn test_explicit_pattern_wins() {
        let mut config = Config::default();
        config.storage.pattern = Some("archive/*.csv".to_string());
        assert_eq!(config.pattern(), "archive/*.csv");
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::try_parse_from([
            "serpbeat",
            "--api-key",
            "from-cli",
            "--cse-id",
            "engine",
            "schedule",
            "q",
            "--dir",
            "out",
            "--every",
            "45s",
            "-n",
            "20",
        ])
        .unwrap();

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.api.api_key, "from-cli");
        assert_eq!(config.api.cse_id, "engine");
        assert_eq!(config.api.results_per_query, 20);
        assert_eq!(config.storage.dir, PathBuf::from("out"));
        assert_eq!(
            config.schedule().unwrap(),
            Schedule::Every(TimeDelta::seconds(45))
        );
        // untouched settings keep their values
        assert_eq!(config.schedule.poll_seconds, 1);
    }

    #[test]
    fn test_fixed_loop_from_config() {
        let mut config = Config::default();
        config.schedule.loop_iterations = 3;
        config.schedule.loop_sleep = "250ms".to_string();
        let fixed = config.fixed_loop().unwrap();
        assert_eq!(fixed.iterations, 3);
        assert_eq!(fixed.sleep, Duration::from_millis(250));

        config.schedule.loop_sleep = "soon".to_string();
        assert!(config.fixed_loop().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[schedule]"));
        assert!(toml_str.contains("[chart]"));

        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.api.endpoint, Config::default().api.endpoint);
    }
}
