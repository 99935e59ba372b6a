//! Markdown and JSON report generation.
//!
//! This module turns an aggregated table into the per-domain statistics
//! report and renders it for humans (Markdown) or tools (JSON).

use crate::analysis::{domain_stats, page_count, term_summaries};
use crate::models::{AggregatedTable, DomainStats, ReportMetadata, StatsReport, TermSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

/// Build the statistics report for `table`, keeping the `top` best domains.
pub fn build_stats_report(pattern: &str, table: &AggregatedTable, top: usize) -> StatsReport {
    let mut domains = domain_stats(&table.rows);
    domains.truncate(top);

    StatsReport {
        metadata: ReportMetadata {
            pattern: pattern.to_string(),
            generated_at: Utc::now(),
            files: table.files.len(),
            rows: table.len(),
            pages: page_count(&table.rows),
            days: table.distinct_days(),
        },
        domains,
        terms: term_summaries(&table.rows),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &StatsReport) -> String {
    let mut output = String::new();

    output.push_str("# SERP Domain Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_domains_section(&report.domains));
    output.push_str(&generate_terms_section(&report.terms));

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Pattern:** `{}`\n", metadata.pattern));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Files:** {}\n", metadata.files));
    section.push_str(&format!("- **Rows:** {}\n", metadata.rows));
    section.push_str(&format!("- **Result Pages:** {}\n", metadata.pages));
    if !metadata.days.is_empty() {
        section.push_str(&format!("- **Days:** {}\n", metadata.days.join(", ")));
    }
    section.push('\n');

    section
}

fn generate_domains_section(domains: &[DomainStats]) -> String {
    let mut section = String::new();

    section.push_str("## Top Domains\n\n");
    if domains.is_empty() {
        section.push_str("No results recorded.\n\n");
        return section;
    }

    section.push_str("| # | Domain | Results | Mean Rank | Coverage |\n");
    section.push_str("|---:|---|---:|---:|---:|\n");
    for (i, stats) in domains.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {:.2} | {:.1}% |\n",
            i + 1,
            stats.domain,
            stats.count,
            stats.mean_rank,
            stats.coverage * 100.0
        ));
    }
    section.push('\n');

    section
}

fn generate_terms_section(terms: &[TermSummary]) -> String {
    if terms.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Search Terms\n\n");
    section.push_str("| Search Terms | Results | Observations |\n");
    section.push_str("|---|---:|---:|\n");
    for term in terms {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            term.search_terms, term.rows, term.observations
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &StatsReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to `path`.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::aggregated;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_table() -> AggregatedTable {
        AggregatedTable {
            files: vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")],
            rows: vec![
                aggregated("Calories in Pizza", 1, "a.com", "2021-01-05 10:00:00"),
                aggregated("Calories in Pizza", 2, "b.com", "2021-01-05 10:00:00"),
                aggregated("Calories in Pizza", 1, "b.com", "2021-01-06 10:00:00"),
                aggregated("Calories in Pizza", 2, "a.com", "2021-01-06 10:00:00"),
                aggregated("Calories in Pizza", 3, "c.com", "2021-01-06 10:00:00"),
            ],
        }
    }

    #[test]
    fn test_build_stats_report() {
        let report = build_stats_report("serp*_scheduled_serp.csv", &create_test_table(), 2);

        assert_eq!(report.metadata.files, 2);
        assert_eq!(report.metadata.rows, 5);
        assert_eq!(report.metadata.pages, 2);
        assert_eq!(report.metadata.days, vec!["2021-01-05", "2021-01-06"]);
        assert_eq!(report.domains.len(), 2);
        // a.com and b.com both appear twice with mean rank 1.5
        assert_eq!(report.domains[0].domain, "a.com");
        assert!((report.domains[0].coverage - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.terms[0].observations, 2);
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = build_stats_report("serp*.csv", &create_test_table(), 10);
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# SERP Domain Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`serp*.csv`"));
        assert!(markdown.contains("| 1 | a.com | 2 | 1.50 | 100.0% |"));
        assert!(markdown.contains("| 3 | c.com | 1 | 3.00 | 50.0% |"));
        assert!(markdown.contains("| Calories in Pizza | 5 | 2 |"));
    }

    #[test]
    fn test_markdown_for_empty_table() {
        let report = build_stats_report("none", &AggregatedTable::default(), 10);
        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No results recorded."));
        assert!(!markdown.contains("## Search Terms"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = build_stats_report("serp*.csv", &create_test_table(), 10);
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"mean_rank\""));
        assert!(json.contains("\"coverage\""));

        let back: StatsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.domains, report.domains);
    }

    #[test]
    fn test_save_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        save_report("# hi\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi\n");
    }
}
