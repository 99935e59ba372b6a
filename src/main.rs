//! serpbeat - SERP recorder and ranking visualizer
//!
//! A CLI tool that fetches search engine result pages for a set of
//! queries, stores every snapshot as a CSV file, and turns the collected
//! snapshots into statistics and animated Plotly charts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid arguments, API failure, unreadable batch, etc.)

mod analysis;
mod cli;
mod config;
mod fetcher;
mod models;
mod report;
mod schedule;
mod search;
mod storage;

use anyhow::{bail, Context, Result};
use chrono::Local;
use cli::{Args, ChartArgs, ChartPreset, Command, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use fetcher::{Fetcher, StoredBatch};
use models::{AggregatedRow, AggregatedTable};
use report::chart::{Facet, MarkerSize};
use report::ChartSpec;
use schedule::{RecurringTask, Scheduler};
use search::GoogleSearchClient;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config(args.config.as_deref());
    }

    // config first, so `[general] verbose` can raise the log level
    let loaded = load_config(&args);
    let config_verbose = loaded
        .as_ref()
        .map(|(config, _)| config.general.verbose)
        .unwrap_or(false);
    init_logging(args.log_level(config_verbose))?;

    info!("serpbeat v{}", env!("CARGO_PKG_VERSION"));
    // the full Args carry credentials; log only the command
    debug!("Command: {:?}", args.command);

    let result = match loaded {
        Ok((config, origin)) => {
            origin.log();
            run(args, config).await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: write a default config file without overwriting.
fn handle_init_config(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Set SERPBEAT_API_KEY and SERPBEAT_CSE_ID, or fill in [api].");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Dispatch the parsed command.
async fn run(args: Args, mut config: Config) -> Result<()> {
    config.merge_with_args(&args);
    let show_progress = !args.quiet;

    let command = match args.command {
        Some(command) => command,
        None => bail!("No command given"),
    };

    match command {
        Command::Fetch(fetch) => run_fetch(&config, &fetch.queries, show_progress).await,
        Command::Schedule { fetch, .. } => {
            run_schedule(&config, &fetch.queries, show_progress).await
        }
        Command::Loop { fetch, .. } => run_loop(&config, &fetch.queries, show_progress).await,
        Command::Aggregate { source, output } => {
            run_aggregate(&config, source.pattern, output.as_deref())
        }
        Command::Chart(chart) => run_chart(&config, chart),
        Command::Stats {
            source,
            top,
            format,
            output,
        } => run_stats(&config, source.pattern, top, format, output.as_deref()),
        Command::Explore {
            keyword,
            term,
            output,
            ..
        } => run_explore(&config, &keyword, term, output, show_progress).await,
    }
}

/// Where the configuration came from. Logged once logging is up.
enum ConfigOrigin {
    Explicit(PathBuf),
    Default,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::Default => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    Ok(match Config::load_default() {
        Ok(Some(config)) => (config, ConfigOrigin::Default),
        Ok(None) => (Config::default(), ConfigOrigin::Builtin),
        Err(e) => (Config::default(), ConfigOrigin::Unreadable(e)),
    })
}

fn make_fetcher(config: &Config, show_progress: bool) -> Result<Fetcher<GoogleSearchClient>> {
    let client = GoogleSearchClient::new(config.client_config())
        .context("Cannot create search client (set SERPBEAT_API_KEY and SERPBEAT_CSE_ID)")?;
    Ok(Fetcher::new(client, config.fetch_options(show_progress)))
}

fn print_stored(stored: &StoredBatch) {
    println!(
        "✅ Saved {} results for {} queries to: {}",
        stored.batch.rows.len(),
        stored.batch.queries.len(),
        stored.path.display()
    );
}

async fn run_fetch(config: &Config, queries: &[String], show_progress: bool) -> Result<()> {
    let fetcher = make_fetcher(config, show_progress)?;
    let store = config.batch_store();

    println!("🔎 Fetching {} queries...", queries.len());
    let stored = fetcher.fetch_and_store(queries, &store).await?;
    print_stored(&stored);
    Ok(())
}

async fn run_schedule(config: &Config, queries: &[String], show_progress: bool) -> Result<()> {
    let fetcher = make_fetcher(config, show_progress)?;
    let store = config.batch_store();
    let task = RecurringTask::new(config.schedule()?, Local::now(), config.schedule.max_runs);

    println!(
        "⏰ Fetching {} queries {}; first run at {}",
        queries.len(),
        task.schedule(),
        task.next_due().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(max) = config.schedule.max_runs {
        println!("   Stopping after {} runs", max);
    } else {
        println!("   Press Ctrl+C to stop");
    }

    let mut scheduler = Scheduler::new(task, config.poll_interval());
    let (fetcher, store) = (&fetcher, &store);
    let runs = scheduler
        .run(move || async move {
            let stored = fetcher.fetch_and_store(queries, store).await?;
            print_stored(&stored);
            Ok(())
        })
        .await?;

    println!("\n✅ Schedule finished after {} runs.", runs);
    Ok(())
}

async fn run_loop(config: &Config, queries: &[String], show_progress: bool) -> Result<()> {
    let fetcher = make_fetcher(config, show_progress)?;
    let store = config.batch_store();
    let fixed = config.fixed_loop()?;

    println!(
        "🔁 Fetching {} queries {} times, sleeping {:?} after each",
        queries.len(),
        fixed.iterations,
        fixed.sleep
    );

    let (fetcher, store) = (&fetcher, &store);
    let runs = fixed
        .run(move || async move {
            let stored = fetcher.fetch_and_store(queries, store).await?;
            print_stored(&stored);
            Ok(())
        })
        .await?;

    println!("\n✅ Loop finished after {} runs.", runs);
    Ok(())
}

fn load_table(config: &Config, pattern: Option<String>) -> Result<(String, AggregatedTable)> {
    let pattern = pattern.unwrap_or_else(|| config.pattern());
    let table = analysis::aggregate(&pattern)
        .with_context(|| format!("Failed to aggregate batches matching {}", pattern))?;
    if table.is_empty() {
        warn!("{} files match {} but none holds any rows", table.files.len(), pattern);
    }
    Ok((pattern, table))
}

fn run_aggregate(config: &Config, pattern: Option<String>, output: Option<&Path>) -> Result<()> {
    let (pattern, table) = load_table(config, pattern)?;

    println!("\n📦 Aggregation Summary:");
    println!("   Pattern: {}", pattern);
    println!("   Files: {}", table.files.len());
    println!("   Rows: {}", table.len());
    println!("   Search terms: {}", table.distinct_terms().join(", "));
    println!("   Days: {}", table.distinct_days().join(", "));

    let mut stamps: Vec<_> = table
        .files
        .iter()
        .filter_map(|p| p.file_name()?.to_str())
        .filter_map(|name| storage::parse_batch_timestamp(name, &config.storage.prefix))
        .collect();
    stamps.sort();
    if let (Some(first), Some(last)) = (stamps.first(), stamps.last()) {
        println!(
            "   Fetched: {} to {}",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        );
    }

    if let Some(path) = output {
        storage::write_united(path, &table.rows)
            .with_context(|| format!("Failed to write united table to {}", path.display()))?;
        println!("\n✅ United table saved to: {}", path.display());
    }
    Ok(())
}

/// Apply the filters a chart command asks for. The table is left as is.
fn select_rows(table: &AggregatedTable, chart: &ChartArgs, top: Option<usize>) -> Vec<AggregatedRow> {
    let mut rows = table.rows.clone();
    if let Some(ref term) = chart.term {
        rows = analysis::filter_by_term(&rows, term);
    }
    if !chart.terms.is_empty() {
        rows = analysis::filter_by_terms(&rows, &chart.terms);
    }
    if let Some(n) = top {
        let domains = analysis::top_domains(&rows, n);
        rows = analysis::filter_by_domains(&rows, &domains);
    }
    if matches!(chart.preset, ChartPreset::TopDomains | ChartPreset::MultiSerp) {
        analysis::sort_for_comparison(&mut rows);
    }
    rows
}

/// Preset plus any per-field overrides from the command line.
fn chart_spec(config: &Config, chart: &ChartArgs, top: usize) -> ChartSpec {
    let mut spec = chart.preset.spec(top);
    spec.frame_warning_threshold = config.chart.frame_warning_threshold;

    if let Some(x) = chart.x {
        spec.x = x;
    }
    if let Some(y) = chart.y {
        spec.y = y;
    }
    if let Some(color) = chart.color {
        spec.color = Some(color);
    }
    if let Some(frame) = chart.frame {
        spec.animation_frame = Some(frame);
    }
    if let Some(column) = chart.facet {
        spec.facet = Some(Facet::new(column, chart.facet_wrap.unwrap_or(1)));
    } else if let (Some(facet), Some(wrap)) = (spec.facet.as_mut(), chart.facet_wrap) {
        facet.wrap = wrap;
    }
    if chart.rank_size {
        spec.size = MarkerSize::Rank;
    }
    if let Some(ref title) = chart.title {
        spec.title = Some(title.clone());
    }
    if let Some(ms) = chart.frame_ms {
        spec.frame_duration_ms = ms;
    }
    if let Some(ms) = chart.transition_ms {
        spec.transition_duration_ms = ms;
    }
    spec
}

fn render_chart(
    config: &Config,
    spec: &ChartSpec,
    rows: &[AggregatedRow],
    output: &Path,
) -> Result<()> {
    let figure = report::build_figure(spec, rows);
    let title = spec
        .title
        .clone()
        .unwrap_or_else(|| "SERP Rankings".to_string());
    let html = report::render_html(&figure, &title, &config.chart.plotly_js_url)
        .context("Failed to serialize chart")?;
    report::save_report(&html, output)?;

    println!(
        "✅ Chart with {} rows and {} frames saved to: {}",
        rows.len(),
        figure.frames.len(),
        output.display()
    );
    Ok(())
}

fn run_chart(config: &Config, chart: ChartArgs) -> Result<()> {
    let (_, table) = load_table(config, chart.source.pattern.clone())?;

    let top = match (chart.preset, chart.top) {
        (_, Some(n)) => Some(n),
        (ChartPreset::TopDomains, None) => Some(config.chart.top_domains),
        _ => None,
    };
    let rows = select_rows(&table, &chart, top);
    if rows.is_empty() {
        bail!("No rows left to chart after filtering");
    }

    let spec = chart_spec(config, &chart, top.unwrap_or(config.chart.top_domains));
    let output = chart
        .output
        .clone()
        .unwrap_or_else(|| config.chart.output.clone());

    println!("📈 Charting {} of {} rows...", rows.len(), table.len());
    render_chart(config, &spec, &rows, &output)
}

fn run_stats(
    config: &Config,
    pattern: Option<String>,
    top: Option<usize>,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let (pattern, table) = load_table(config, pattern)?;
    let top = top.unwrap_or(config.chart.top_domains);
    let stats = report::build_stats_report(&pattern, &table, top);

    let content = match format {
        OutputFormat::Json => report::generate_json_report(&stats)?,
        OutputFormat::Markdown => report::generate_markdown_report(&stats),
    };

    match output {
        Some(path) => {
            report::save_report(&content, path)?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn run_explore(
    config: &Config,
    keyword: &str,
    term: Option<String>,
    output: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    // warn before the client asks for credentials
    if keyword.trim().is_empty() {
        println!("⚠️  Please enter a keyword to fetch.");
        return Ok(());
    }

    let fetcher = make_fetcher(config, show_progress)?;
    let store = config.batch_store();
    let Some(stored) = fetcher.explore(keyword, &store).await? else {
        println!("⚠️  Please enter a keyword to fetch.");
        return Ok(());
    };
    print_stored(&stored);

    println!("\n🔤 Search terms:");
    for t in stored.batch.distinct_terms() {
        println!("   • {}", t);
    }

    let Some(term) = term else {
        return Ok(());
    };
    let rows = stored.rows_for_term(&term)?;

    let mut spec = ChartSpec::heartbeat();
    spec.frame_warning_threshold = config.chart.frame_warning_threshold;
    spec.title = Some(format!("{} rankings", term));
    let output = output.unwrap_or_else(|| config.chart.output.clone());
    render_chart(config, &spec, &rows, &output)
}
