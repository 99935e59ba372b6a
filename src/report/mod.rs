//! Report and chart output.

pub mod chart;
pub mod generator;

pub use chart::{build_figure, render_html, ChartSpec};
pub use generator::{
    build_stats_report, generate_json_report, generate_markdown_report, save_report,
};
