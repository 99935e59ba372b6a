//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Column;
use crate::report::ChartSpec;
use crate::schedule::{parse_duration, Schedule};
use crate::search::MAX_RESULTS_PER_QUERY;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// serpbeat - record search result pages over time and chart the changes
///
/// Fetch Google search results for a set of queries on a schedule, keep
/// every snapshot as a CSV file, then aggregate the snapshots into
/// statistics and animated ranking charts.
///
/// Examples:
///   serpbeat fetch "Calories in Pizza" "Calories in BigMac"
///   serpbeat schedule "Calories in Pizza" --every 30m
///   serpbeat schedule "Calories in Pizza" --every daily@13:25
///   serpbeat chart --preset heartbeat --term pizza
///   serpbeat stats --format json
///   serpbeat --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .serpbeat.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Search API key
    #[arg(long, env = "SERPBEAT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Programmable search engine id
    #[arg(long, env = "SERPBEAT_CSE_ID", hide_env_values = true, global = true)]
    pub cse_id: Option<String>,

    /// Search API endpoint URL
    #[arg(long, value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    /// Generate a default .serpbeat.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch every query once and write one batch file
    Fetch(FetchArgs),

    /// Fetch repeatedly on a recurring schedule
    Schedule {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Interval (45s, 30m, 1h) or daily@HH:MM
        #[arg(long, value_name = "SCHEDULE")]
        every: Option<String>,

        /// Stop after this many runs
        #[arg(long, value_name = "N")]
        max_runs: Option<u64>,

        /// How often to check whether a run is due
        #[arg(long, value_name = "SECS")]
        poll_secs: Option<u64>,
    },

    /// Fetch a fixed number of times with a sleep in between
    Loop {
        #[command(flatten)]
        fetch: FetchArgs,

        /// Number of fetches
        #[arg(long, value_name = "N")]
        iterations: Option<u64>,

        /// Pause after each fetch (e.g. 1s, 500ms)
        #[arg(long, value_name = "DURATION")]
        sleep: Option<String>,
    },

    /// Aggregate batch files and print a summary
    Aggregate {
        #[command(flatten)]
        source: SourceArgs,

        /// Also write the united table (with queryDay) to this CSV file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Render an animated ranking chart to HTML
    Chart(ChartArgs),

    /// Per-domain count, mean rank and coverage report
    Stats {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of domains to list
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Fetch one keyword, list its terms and optionally chart one
    Explore {
        /// Keyword to fetch
        #[arg(short, long, default_value = "")]
        keyword: String,

        /// Render the chart for this search term
        #[arg(long, value_name = "TERM")]
        term: Option<String>,

        #[command(flatten)]
        store: StoreArgs,

        /// Chart output file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Where batch files are written.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Directory for batch files
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File name prefix for batch files
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Queries plus fetch settings.
#[derive(clap::Args, Debug, Clone)]
pub struct FetchArgs {
    /// Queries to search for
    #[arg(value_name = "QUERY", required = true)]
    pub queries: Vec<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Results per query (1-100)
    #[arg(short, long, value_name = "COUNT")]
    pub num: Option<u32>,

    /// Country code to restrict results to (e.g. us)
    #[arg(long, value_name = "CODE")]
    pub gl: Option<String>,
}

/// Which batch files to aggregate.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Glob pattern for batch files
    ///
    /// Defaults to <dir>/<prefix>*_scheduled_serp.csv from the config
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChartArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Chart preset
    #[arg(long, value_enum, default_value = "heartbeat")]
    pub preset: ChartPreset,

    /// Keep queries containing this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub term: Option<String>,

    /// Keep only these exact queries (comma-separated)
    #[arg(long, value_name = "TERMS", value_delimiter = ',')]
    pub terms: Vec<String>,

    /// Keep only the N most frequent domains
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Column on the x axis
    #[arg(long, value_enum, value_name = "COLUMN")]
    pub x: Option<Column>,

    /// Column on the y axis
    #[arg(long, value_enum, value_name = "COLUMN")]
    pub y: Option<Column>,

    /// Column that drives marker color
    #[arg(long, value_enum, value_name = "COLUMN")]
    pub color: Option<Column>,

    /// Column that drives animation frames
    #[arg(long, value_enum, value_name = "COLUMN")]
    pub frame: Option<Column>,

    /// Column that splits the chart into panels
    #[arg(long, value_enum, value_name = "COLUMN")]
    pub facet: Option<Column>,

    /// Panels per row
    #[arg(long, value_name = "N")]
    pub facet_wrap: Option<usize>,

    /// Size markers by rank instead of a constant
    #[arg(long)]
    pub rank_size: bool,

    /// Chart title
    #[arg(long)]
    pub title: Option<String>,

    /// Output HTML file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Frame duration in milliseconds
    #[arg(long, value_name = "MS")]
    pub frame_ms: Option<u64>,

    /// Transition duration in milliseconds
    #[arg(long, value_name = "MS")]
    pub transition_ms: Option<u64>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Built-in chart layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ChartPreset {
    /// Domain ranks for one query, animated by observation time
    #[default]
    Heartbeat,
    /// Best domains compared across days
    TopDomains,
    /// Several queries in panels, animated by day
    MultiSerp,
}

impl ChartPreset {
    pub fn spec(&self, top: usize) -> ChartSpec {
        match self {
            ChartPreset::Heartbeat => ChartSpec::heartbeat(),
            ChartPreset::TopDomains => ChartSpec::top_domains(top),
            ChartPreset::MultiSerp => ChartSpec::multi_serp(),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        let command = match self.command {
            Some(ref command) => command,
            None => return Err("No command given (try --help)".to_string()),
        };

        match command {
            Command::Fetch(fetch) => fetch.validate()?,
            Command::Schedule {
                fetch,
                every,
                max_runs,
                poll_secs,
            } => {
                fetch.validate()?;
                if let Some(every) = every {
                    every
                        .parse::<Schedule>()
                        .map_err(|e| format!("Invalid --every: {}", e))?;
                }
                if *max_runs == Some(0) {
                    return Err("Max runs must be at least 1".to_string());
                }
                if *poll_secs == Some(0) {
                    return Err("Poll interval must be at least 1 second".to_string());
                }
            }
            Command::Loop {
                fetch,
                iterations,
                sleep,
            } => {
                fetch.validate()?;
                if *iterations == Some(0) {
                    return Err("Iterations must be at least 1".to_string());
                }
                if let Some(sleep) = sleep {
                    parse_duration(sleep).map_err(|e| format!("Invalid --sleep: {}", e))?;
                }
            }
            Command::Chart(chart) => {
                if chart.top == Some(0) {
                    return Err("Top must be at least 1".to_string());
                }
                if chart.facet_wrap == Some(0) {
                    return Err("Facet wrap must be at least 1".to_string());
                }
            }
            Command::Stats { top, .. } => {
                if *top == Some(0) {
                    return Err("Top must be at least 1".to_string());
                }
            }
            Command::Aggregate { .. } | Command::Explore { .. } => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl FetchArgs {
    fn validate(&self) -> Result<(), String> {
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err("At least one non-empty query is required".to_string());
        }
        if let Some(num) = self.num {
            if num == 0 || num > MAX_RESULTS_PER_QUERY {
                return Err(format!(
                    "Results per query must be between 1 and {}",
                    MAX_RESULTS_PER_QUERY
                ));
            }
        }
        if let Some(ref gl) = self.gl {
            if gl.trim().is_empty() {
                return Err("Country code cannot be empty".to_string());
            }
        }
        Ok(())
    }
}
