//! Row selection and statistics over an aggregated table.
//!
//! Every function here borrows the source rows and returns new vectors;
//! the aggregated table itself is never modified.

use crate::models::{AggregatedRow, DomainStats, TermSummary};
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Rows whose search terms contain `needle`, ignoring case.
pub fn filter_by_term(rows: &[AggregatedRow], needle: &str) -> Vec<AggregatedRow> {
    let needle = needle.to_lowercase();
    rows.iter()
        .filter(|r| r.row.search_terms.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Rows whose search terms are exactly one of `terms`.
pub fn filter_by_terms(rows: &[AggregatedRow], terms: &[String]) -> Vec<AggregatedRow> {
    let wanted: HashSet<&str> = terms.iter().map(|t| t.as_str()).collect();
    rows.iter()
        .filter(|r| wanted.contains(r.row.search_terms.as_str()))
        .cloned()
        .collect()
}

/// The `n` display domains with the most rows.
///
/// Ties keep the order in which the domains first appear.
pub fn top_domains(rows: &[AggregatedRow], n: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for r in rows {
        let domain = r.row.display_link.as_str();
        let count = counts.entry(domain).or_insert(0);
        if *count == 0 {
            order.push(domain);
        }
        *count += 1;
    }

    // stable sort keeps first-appearance order among equal counts
    order.sort_by_key(|d| std::cmp::Reverse(counts[d]));
    order.into_iter().take(n).map(str::to_string).collect()
}

/// Rows whose display domain is in `domains`.
pub fn filter_by_domains(rows: &[AggregatedRow], domains: &[String]) -> Vec<AggregatedRow> {
    let wanted: HashSet<&str> = domains.iter().map(|d| d.as_str()).collect();
    rows.iter()
        .filter(|r| wanted.contains(r.row.display_link.as_str()))
        .cloned()
        .collect()
}

/// Sort by `queryDay`, then `searchTerms`, then `rank`.
pub fn sort_for_comparison(rows: &mut [AggregatedRow]) {
    rows.sort_by(|a, b| {
        a.query_day
            .cmp(&b.query_day)
            .then_with(|| a.row.search_terms.cmp(&b.row.search_terms))
            .then_with(|| a.row.rank.cmp(&b.row.rank))
    });
}

/// One result page: the search terms and the time they were queried.
type PageKey<'a> = (&'a str, DateTime<FixedOffset>);

/// Number of distinct result pages, one per (search terms, query time).
pub fn page_count(rows: &[AggregatedRow]) -> usize {
    rows.iter()
        .map(|r| (r.row.search_terms.as_str(), r.row.query_time))
        .collect::<HashSet<PageKey<'_>>>()
        .len()
}

/// Per-domain row count, mean rank and page coverage.
///
/// Coverage is the share of pages on which the domain appears at least
/// once, so a domain holding several ranks on one page counts that page once.
/// Sorted by count descending, then mean rank ascending, then domain.
pub fn domain_stats(rows: &[AggregatedRow]) -> Vec<DomainStats> {
    let pages = page_count(rows);
    let mut totals: HashMap<&str, (usize, u64, HashSet<PageKey<'_>>)> = HashMap::new();

    for r in rows {
        let entry = totals
            .entry(r.row.display_link.as_str())
            .or_insert_with(|| (0, 0, HashSet::new()));
        entry.0 += 1;
        entry.1 += u64::from(r.row.rank);
        entry.2.insert((r.row.search_terms.as_str(), r.row.query_time));
    }

    let mut stats: Vec<DomainStats> = totals
        .into_iter()
        .map(|(domain, (count, rank_sum, seen))| DomainStats {
            domain: domain.to_string(),
            count,
            mean_rank: rank_sum as f64 / count as f64,
            coverage: if pages == 0 {
                0.0
            } else {
                seen.len() as f64 / pages as f64
            },
        })
        .collect();

    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| {
                a.mean_rank
                    .partial_cmp(&b.mean_rank)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.domain.cmp(&b.domain))
    });
    stats
}

/// Rows and observations per search term, in order of first appearance.
pub fn term_summaries(rows: &[AggregatedRow]) -> Vec<TermSummary> {
    let mut summaries: Vec<TermSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut seen_pages = HashSet::new();

    for r in rows {
        let term = r.row.search_terms.as_str();
        let i = *index.entry(term).or_insert_with(|| {
            summaries.push(TermSummary {
                search_terms: term.to_string(),
                rows: 0,
                observations: 0,
            });
            summaries.len() - 1
        });
        summaries[i].rows += 1;
        if seen_pages.insert((term, r.row.query_time)) {
            summaries[i].observations += 1;
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::aggregated;

    fn table() -> Vec<AggregatedRow> {
        vec![
            aggregated("Calories in Pizza", 1, "a.com", "2021-01-06 10:00:00"),
            aggregated("Calories in Pizza", 2, "b.com", "2021-01-06 10:00:00"),
            aggregated("Calories in BigMac", 1, "a.com", "2021-01-06 10:00:00"),
            aggregated("Calories in BigMac", 2, "c.com", "2021-01-06 10:00:00"),
            aggregated("pizza near me", 1, "b.com", "2021-01-05 10:00:00"),
            aggregated("Calories in Pizza", 1, "a.com", "2021-01-05 10:00:00"),
            aggregated("Calories in Pizza", 2, "d.com", "2021-01-05 10:00:00"),
        ]
    }

    #[test]
    fn test_filter_by_term_is_case_insensitive() {
        let rows = table();
        let pizza = filter_by_term(&rows, "PIZZA");
        assert_eq!(pizza.len(), 5);
        assert!(pizza
            .iter()
            .all(|r| r.row.search_terms.to_lowercase().contains("pizza")));
        // source untouched
        assert_eq!(rows.len(), 7);
    }

    #[test]
    fn test_filter_by_term_is_idempotent() {
        let rows = table();
        let once = filter_by_term(&rows, "pizza");
        let twice = filter_by_term(&once, "pizza");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_by_terms_is_exact() {
        let rows = table();
        let picked = filter_by_terms(&rows, &["Calories in Pizza".to_string()]);
        assert_eq!(picked.len(), 4);
        assert!(filter_by_terms(&rows, &["calories in pizza".to_string()]).is_empty());
    }

    #[test]
    fn test_top_domains_ties_by_first_appearance() {
        let rows = table();
        // a.com: 3, b.com: 2, c.com: 1, d.com: 1
        assert_eq!(top_domains(&rows, 3), vec!["a.com", "b.com", "c.com"]);
        assert_eq!(top_domains(&rows, 10).len(), 4);
        assert!(top_domains(&rows, 0).is_empty());
    }

    #[test]
    fn test_filter_by_domains() {
        let rows = table();
        let top = top_domains(&rows, 1);
        let kept = filter_by_domains(&rows, &top);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|r| r.row.display_link == "a.com"));
    }

    #[test]
    fn test_sort_for_comparison() {
        let mut rows = table();
        sort_for_comparison(&mut rows);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.query_day_label(), r.row.search_terms.clone(), r.row.rank))
            .collect();
        assert_eq!(keys[0], ("2021-01-05".into(), "Calories in Pizza".into(), 1));
        assert_eq!(keys[2], ("2021-01-05".into(), "pizza near me".into(), 1));
        assert_eq!(keys[3], ("2021-01-06".into(), "Calories in BigMac".into(), 1));
        assert_eq!(keys[6], ("2021-01-06".into(), "Calories in Pizza".into(), 2));
    }

    #[test]
    fn test_domain_stats() {
        let rows = table();
        let stats = domain_stats(&rows);

        assert_eq!(page_count(&rows), 4);
        assert_eq!(stats[0].domain, "a.com");
        assert_eq!(stats[0].count, 3);
        assert!((stats[0].mean_rank - 1.0).abs() < f64::EPSILON);
        assert!((stats[0].coverage - 0.75).abs() < f64::EPSILON);

        assert_eq!(stats[1].domain, "b.com");
        assert!((stats[1].mean_rank - 1.5).abs() < f64::EPSILON);

        // c.com and d.com tie on count and mean rank
        assert_eq!(stats[2].domain, "c.com");
        assert_eq!(stats[3].domain, "d.com");
    }

    #[test]
    fn test_coverage_counts_each_page_once() {
        let rows = vec![
            aggregated("python", 1, "en.wikipedia.org", "2021-01-05 10:00:00"),
            aggregated("python", 2, "en.wikipedia.org", "2021-01-05 10:00:00"),
            aggregated("python", 3, "python.org", "2021-01-05 10:00:00"),
            aggregated("python", 1, "python.org", "2021-01-06 10:00:00"),
        ];
        let stats = domain_stats(&rows);
        assert_eq!(page_count(&rows), 2);

        let wiki = stats.iter().find(|s| s.domain == "en.wikipedia.org").unwrap();
        assert_eq!(wiki.count, 2);
        assert!((wiki.coverage - 0.5).abs() < f64::EPSILON);

        let python = stats.iter().find(|s| s.domain == "python.org").unwrap();
        assert!((python.coverage - 1.0).abs() < f64::EPSILON);
        assert!(stats.iter().all(|s| s.coverage <= 1.0));
    }

    #[test]
    fn test_domain_stats_empty() {
        assert!(domain_stats(&[]).is_empty());
    }

    #[test]
    fn test_term_summaries() {
        let summaries = term_summaries(&table());
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].search_terms, "Calories in Pizza");
        assert_eq!(summaries[0].rows, 4);
        assert_eq!(summaries[0].observations, 2);
        assert_eq!(summaries[2].search_terms, "pizza near me");
        assert_eq!(summaries[2].observations, 1);
    }
}
