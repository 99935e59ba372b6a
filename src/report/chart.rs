//! Plotly chart rendering.
//!
//! A [`ChartSpec`] describes which columns drive position, color, hover,
//! animation and faceting. [`build_figure`] turns filtered rows into a
//! Plotly figure (traces, layout, animation frames) and [`render_html`]
//! wraps it in a self-contained page.

use crate::models::{AggregatedRow, CellValue, Column};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Where the page loads plotly.js from unless configured otherwise.
pub const DEFAULT_PLOTLY_JS_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Frames × facets above which rendering is likely to struggle.
pub const DEFAULT_FRAME_WARNING_THRESHOLD: usize = 500;

/// Largest marker diameter, in pixels, when no other maximum is given.
pub const DEFAULT_SIZE_MAX: f64 = 20.0;

const DEFAULT_FACET_ROW_SPACING: f64 = 0.07;
const FACET_COL_SPACING: f64 = 0.03;

/// Plotly's default qualitative palette.
const PALETTE: [&str; 10] = [
    "#636efa", "#EF553B", "#00cc96", "#ab63fa", "#FFA15A", "#19d3f3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Scatter,
    Bar,
}

/// How marker sizes are derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerSize {
    /// The same value for every row.
    Constant(f64),
    /// `max_rank + 1 - rank`, so better ranks get bigger markers.
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Plotly,
    PlotlyWhite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryOrder {
    TotalAscending,
}

impl CategoryOrder {
    fn as_str(&self) -> &'static str {
        match self {
            CategoryOrder::TotalAscending => "total ascending",
        }
    }
}

/// Small multiples, one panel per distinct value of `column`.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub column: Column,
    /// Panels per row.
    pub wrap: usize,
    /// Vertical gap between panel rows, as a fraction of the plot height.
    pub row_spacing: f64,
}

impl Facet {
    pub fn new(column: Column, wrap: usize) -> Self {
        Self {
            column,
            wrap,
            row_spacing: DEFAULT_FACET_ROW_SPACING,
        }
    }
}

/// Display parameters for one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: Column,
    pub y: Column,
    pub color: Option<Column>,
    pub hover_name: Option<Column>,
    pub hover_data: Vec<Column>,
    pub text: Option<Column>,
    pub size: MarkerSize,
    pub size_max: f64,
    pub animation_frame: Option<Column>,
    pub animation_group: Option<Column>,
    pub facet: Option<Facet>,
    pub range_x: Option<[f64; 2]>,
    pub range_y: Option<[f64; 2]>,
    pub labels: Vec<(Column, String)>,
    pub title: Option<String>,
    pub template: Template,
    pub width: u32,
    pub height: u32,
    pub opacity: f64,
    pub frame_duration_ms: u64,
    pub transition_duration_ms: u64,
    pub y_category_order: Option<CategoryOrder>,
    pub frame_warning_threshold: usize,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            kind: ChartKind::Scatter,
            x: Column::DisplayLink,
            y: Column::Rank,
            color: None,
            hover_name: None,
            hover_data: Vec::new(),
            text: None,
            size: MarkerSize::Constant(1.0),
            size_max: DEFAULT_SIZE_MAX,
            animation_frame: None,
            animation_group: None,
            facet: None,
            range_x: None,
            range_y: None,
            labels: Vec::new(),
            title: None,
            template: Template::Plotly,
            width: 900,
            height: 600,
            opacity: 1.0,
            frame_duration_ms: 500,
            transition_duration_ms: 500,
            y_category_order: None,
            frame_warning_threshold: DEFAULT_FRAME_WARNING_THRESHOLD,
        }
    }
}

fn domain_labels() -> Vec<(Column, String)> {
    vec![
        (Column::Rank, "Rankings".to_string()),
        (Column::DisplayLink, "Domain Names".to_string()),
    ]
}

impl ChartSpec {
    /// Per-domain rank over time for one query, animated by observation time.
    pub fn heartbeat() -> Self {
        Self {
            color: Some(Column::DisplayLink),
            hover_name: Some(Column::Link),
            hover_data: vec![Column::SearchTerms, Column::Title, Column::Rank],
            text: Some(Column::DisplayLink),
            size: MarkerSize::Constant(35.0),
            animation_frame: Some(Column::QueryTime),
            animation_group: Some(Column::DisplayLink),
            range_x: Some([-1.0, 11.0]),
            range_y: Some([1.0, 11.0]),
            labels: domain_labels(),
            template: Template::PlotlyWhite,
            width: 900,
            height: 900,
            frame_duration_ms: 500,
            transition_duration_ms: 1000,
            ..Self::default()
        }
    }

    /// Ranks of the best `top` domains, one panel per day.
    pub fn top_domains(top: usize) -> Self {
        Self {
            kind: ChartKind::Bar,
            x: Column::Rank,
            y: Column::DisplayLink,
            color: Some(Column::Rank),
            hover_name: Some(Column::Link),
            hover_data: vec![Column::Title, Column::Link, Column::SearchTerms],
            facet: Some(Facet::new(Column::QueryDay, 1)),
            labels: domain_labels(),
            title: Some(format!(
                "Best {} Domains' Ranking Differences Based on Different Dates",
                top
            )),
            template: Template::PlotlyWhite,
            width: 1000,
            height: 1000,
            y_category_order: Some(CategoryOrder::TotalAscending),
            ..Self::default()
        }
    }

    /// Several queries side by side, animated by day.
    pub fn multi_serp() -> Self {
        Self {
            color: Some(Column::DisplayLink),
            hover_name: Some(Column::Link),
            hover_data: vec![Column::Title, Column::Link, Column::SearchTerms],
            text: Some(Column::DisplayLink),
            size: MarkerSize::Constant(15.0),
            size_max: 15.0,
            animation_frame: Some(Column::QueryDay),
            animation_group: Some(Column::DisplayLink),
            facet: Some(Facet {
                column: Column::SearchTerms,
                wrap: 1,
                row_spacing: 0.01,
            }),
            range_y: Some([0.0, 10.0]),
            labels: domain_labels(),
            title: Some("Multiple SERP Animating for the Ranking Differences".to_string()),
            template: Template::PlotlyWhite,
            width: 1000,
            height: 1000,
            opacity: 0.6,
            frame_duration_ms: 1500,
            transition_duration_ms: 2000,
            ..Self::default()
        }
    }

    /// Axis or legend label for a column.
    pub fn label(&self, column: Column) -> String {
        self.labels
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, l)| l.clone())
            .unwrap_or_else(|| column.name().to_string())
    }

    fn has_continuous_color(&self) -> bool {
        self.color.is_some_and(|c| c.is_numeric())
    }
}

/// A Plotly figure ready to be serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
    pub frames: Vec<Value>,
}

/// Whether `frames × facets` exceeds `threshold`.
pub fn exceeds_render_budget(frames: usize, facets: usize, threshold: usize) -> bool {
    frames.max(1).saturating_mul(facets.max(1)) > threshold
}

/// Build a figure from rows that have already been filtered and sorted.
pub fn build_figure(spec: &ChartSpec, rows: &[AggregatedRow]) -> Figure {
    let builder = FigureBuilder::new(spec, rows);

    let frames_n = builder.frame_values.len();
    let facets_n = builder.facet_values.len();
    if exceeds_render_budget(frames_n, facets_n, spec.frame_warning_threshold) {
        warn!(
            "Chart has {} frames across {} facets; the browser may struggle to render it",
            frames_n.max(1),
            facets_n.max(1)
        );
    }

    let all: Vec<&AggregatedRow> = rows.iter().collect();
    let frames: Vec<Value> = builder
        .frame_values
        .iter()
        .map(|value| {
            let subset: Vec<&AggregatedRow> = all
                .iter()
                .copied()
                .filter(|r| builder.frame_key(r).as_deref() == Some(value.as_str()))
                .collect();
            json!({ "name": value, "data": builder.traces(&subset) })
        })
        .collect();

    let data = match frames.first() {
        Some(first) => first["data"].as_array().cloned().unwrap_or_default(),
        None => builder.traces(&all),
    };

    debug!(
        "Built figure with {} traces, {} frames, {} facets",
        data.len(),
        frames.len(),
        facets_n
    );

    Figure {
        data,
        layout: builder.layout(),
        frames,
    }
}

struct FigureBuilder<'a> {
    spec: &'a ChartSpec,
    /// Legend groups; a single unnamed group when color is absent or continuous.
    groups: Vec<String>,
    facet_values: Vec<String>,
    frame_values: Vec<String>,
    /// (group, facet) pairs present anywhere in the rows, in trace order.
    trace_keys: Vec<(usize, usize)>,
    hover_columns: Vec<Column>,
    max_rank: u32,
    sizeref: f64,
}

impl<'a> FigureBuilder<'a> {
    fn new(spec: &'a ChartSpec, rows: &[AggregatedRow]) -> Self {
        let groups = match spec.color {
            Some(column) if !column.is_numeric() => distinct_labels(rows, column),
            _ => vec![String::new()],
        };
        let facet_values = spec
            .facet
            .as_ref()
            .map(|f| distinct_labels(rows, f.column))
            .unwrap_or_default();
        let frame_values = spec
            .animation_frame
            .map(|column| sorted_labels(rows, column))
            .unwrap_or_default();

        let hover_columns = spec
            .hover_data
            .iter()
            .copied()
            .filter(|c| *c != spec.x && *c != spec.y && Some(*c) != spec.hover_name)
            .collect();

        let max_rank = rows.iter().map(|r| r.row.rank).max().unwrap_or(1);
        let max_size = match spec.size {
            MarkerSize::Constant(size) => size,
            MarkerSize::Rank => f64::from(max_rank),
        };
        let sizeref = if max_size > 0.0 && spec.size_max > 0.0 {
            2.0 * max_size / (spec.size_max * spec.size_max)
        } else {
            1.0
        };

        let mut builder = Self {
            spec,
            groups,
            facet_values,
            frame_values,
            trace_keys: Vec::new(),
            hover_columns,
            max_rank,
            sizeref,
        };

        let present: HashSet<(usize, usize)> = rows.iter().map(|r| builder.trace_key(r)).collect();
        let facets = builder.facet_values.len().max(1);
        builder.trace_keys = (0..builder.groups.len())
            .flat_map(|g| (0..facets).map(move |f| (g, f)))
            .filter(|key| present.contains(key))
            .collect();
        builder
    }

    fn frame_key(&self, row: &AggregatedRow) -> Option<String> {
        self.spec
            .animation_frame
            .map(|column| column.value(row).to_string())
    }

    fn trace_key(&self, row: &AggregatedRow) -> (usize, usize) {
        let group = match self.spec.color {
            Some(column) if !column.is_numeric() => {
                let label = column.value(row).to_string();
                self.groups.iter().position(|g| *g == label).unwrap_or(0)
            }
            _ => 0,
        };
        let facet = match &self.spec.facet {
            Some(facet) => {
                let label = facet.column.value(row).to_string();
                self.facet_values
                    .iter()
                    .position(|f| *f == label)
                    .unwrap_or(0)
            }
            None => 0,
        };
        (group, facet)
    }

    /// One trace per key, so every frame has the same trace layout.
    fn traces(&self, rows: &[&AggregatedRow]) -> Vec<Value> {
        let mut buckets: HashMap<(usize, usize), Vec<&AggregatedRow>> = HashMap::new();
        for &row in rows {
            buckets.entry(self.trace_key(row)).or_default().push(row);
        }

        self.trace_keys
            .iter()
            .map(|key| {
                let bucket = buckets.get(key).map(Vec::as_slice).unwrap_or(&[]);
                self.trace(key.0, key.1, bucket)
            })
            .collect()
    }

    fn trace(&self, group: usize, facet: usize, rows: &[&AggregatedRow]) -> Value {
        let spec = self.spec;
        let continuous = spec.has_continuous_color();
        let name = &self.groups[group];

        let mut trace = Map::new();
        trace.insert("name".into(), json!(name));
        trace.insert("legendgroup".into(), json!(name));
        trace.insert(
            "showlegend".into(),
            json!(facet == 0 && spec.color.is_some() && !continuous),
        );
        trace.insert("x".into(), column_values(rows, spec.x));
        trace.insert("y".into(), column_values(rows, spec.y));
        trace.insert("xaxis".into(), json!(axis_ref("x", facet)));
        trace.insert("yaxis".into(), json!(axis_ref("y", facet)));
        trace.insert("hovertemplate".into(), json!(self.hovertemplate()));

        if let Some(column) = spec.hover_name {
            trace.insert("hovertext".into(), column_values(rows, column));
        }
        if !self.hover_columns.is_empty() {
            let customdata: Vec<Value> = rows
                .iter()
                .map(|r| {
                    Value::Array(
                        self.hover_columns
                            .iter()
                            .map(|c| c.value(r).to_json())
                            .collect(),
                    )
                })
                .collect();
            trace.insert("customdata".into(), Value::Array(customdata));
        }
        if let Some(column) = spec.animation_group {
            trace.insert("ids".into(), column_values(rows, column));
        }

        let mut marker = Map::new();
        match spec.color {
            Some(column) if continuous => {
                marker.insert("color".into(), column_values(rows, column));
                marker.insert("coloraxis".into(), json!("coloraxis"));
            }
            _ => {
                marker.insert("color".into(), json!(PALETTE[group % PALETTE.len()]));
            }
        }
        marker.insert("opacity".into(), json!(spec.opacity));

        match spec.kind {
            ChartKind::Scatter => {
                trace.insert("type".into(), json!("scatter"));
                let sizes: Vec<Value> = rows.iter().map(|r| json!(self.marker_size(r))).collect();
                marker.insert("size".into(), Value::Array(sizes));
                marker.insert("sizemode".into(), json!("area"));
                marker.insert("sizeref".into(), json!(self.sizeref));
                match spec.text {
                    Some(column) => {
                        trace.insert("mode".into(), json!("markers+text"));
                        trace.insert("text".into(), column_values(rows, column));
                        trace.insert("textposition".into(), json!("top center"));
                    }
                    None => {
                        trace.insert("mode".into(), json!("markers"));
                    }
                }
            }
            ChartKind::Bar => {
                trace.insert("type".into(), json!("bar"));
                let horizontal = spec.x.is_numeric() && !spec.y.is_numeric();
                trace.insert(
                    "orientation".into(),
                    json!(if horizontal { "h" } else { "v" }),
                );
                trace.insert("alignmentgroup".into(), json!("True"));
                trace.insert("offsetgroup".into(), json!(name));
            }
        }
        trace.insert("marker".into(), Value::Object(marker));

        Value::Object(trace)
    }

    fn marker_size(&self, row: &AggregatedRow) -> f64 {
        match self.spec.size {
            MarkerSize::Constant(size) => size,
            MarkerSize::Rank => f64::from(self.max_rank + 1 - row.row.rank.min(self.max_rank)),
        }
    }

    fn hovertemplate(&self) -> String {
        let spec = self.spec;
        let mut lines = vec![
            format!("{}=%{{x}}", spec.label(spec.x)),
            format!("{}=%{{y}}", spec.label(spec.y)),
        ];
        for (i, column) in self.hover_columns.iter().enumerate() {
            lines.push(format!("{}=%{{customdata[{}]}}", spec.label(*column), i));
        }
        let head = if spec.hover_name.is_some() {
            "<b>%{hovertext}</b><br><br>"
        } else {
            ""
        };
        format!("{}{}<extra></extra>", head, lines.join("<br>"))
    }

    fn layout(&self) -> Value {
        let spec = self.spec;
        let (plot_bg, grid) = match spec.template {
            Template::Plotly => ("#E5ECF6", "white"),
            Template::PlotlyWhite => ("white", "#EBF0F8"),
        };

        let mut layout = Map::new();
        if let Some(ref title) = spec.title {
            layout.insert("title".into(), json!({ "text": title }));
        }
        layout.insert("width".into(), json!(spec.width));
        layout.insert("height".into(), json!(spec.height));
        layout.insert("margin".into(), json!({ "t": 60 }));
        layout.insert("plot_bgcolor".into(), json!(plot_bg));
        layout.insert("paper_bgcolor".into(), json!("white"));
        let color_label = spec.color.map(|c| spec.label(c)).unwrap_or_default();
        layout.insert(
            "legend".into(),
            json!({
                "title": { "text": color_label },
                "tracegroupgap": 0,
                "itemsizing": "constant",
            }),
        );
        if spec.has_continuous_color() {
            layout.insert(
                "coloraxis".into(),
                json!({ "colorbar": { "title": { "text": color_label } }, "colorscale": "Viridis" }),
            );
        }
        if spec.kind == ChartKind::Bar {
            layout.insert("barmode".into(), json!("relative"));
        }

        let panels = self.facet_values.len().max(1);
        let cols = match &spec.facet {
            Some(f) if f.wrap > 0 => f.wrap.min(panels),
            _ => panels,
        };
        let rows = panels.div_ceil(cols);
        let row_spacing = spec
            .facet
            .as_ref()
            .map(|f| f.row_spacing)
            .unwrap_or(DEFAULT_FACET_ROW_SPACING);
        let col_width = (1.0 - FACET_COL_SPACING * (cols - 1) as f64) / cols as f64;
        let row_height = (1.0 - row_spacing * (rows - 1) as f64) / rows as f64;

        let mut annotations = Vec::new();
        for i in 0..panels {
            let (col, row) = (i % cols, i / cols);
            let x0 = col as f64 * (col_width + FACET_COL_SPACING);
            let y1 = 1.0 - row as f64 * (row_height + row_spacing);
            let domain_x = [round4(x0), round4(x0 + col_width)];
            let domain_y = [round4(y1 - row_height), round4(y1)];

            let mut xaxis = Map::new();
            xaxis.insert("domain".into(), json!(domain_x));
            xaxis.insert("anchor".into(), json!(axis_ref("y", i)));
            xaxis.insert("gridcolor".into(), json!(grid));
            let bottom = row == rows - 1 || i + cols >= panels;
            let x_title = if bottom { spec.label(spec.x) } else { String::new() };
            xaxis.insert("title".into(), json!({ "text": x_title }));
            if let Some(range) = spec.range_x {
                xaxis.insert("range".into(), json!(range));
            }
            if i > 0 {
                xaxis.insert("matches".into(), json!("x"));
            }

            let mut yaxis = Map::new();
            yaxis.insert("domain".into(), json!(domain_y));
            yaxis.insert("anchor".into(), json!(axis_ref("x", i)));
            yaxis.insert("gridcolor".into(), json!(grid));
            let y_title = if col == 0 { spec.label(spec.y) } else { String::new() };
            yaxis.insert("title".into(), json!({ "text": y_title }));
            if let Some(range) = spec.range_y {
                yaxis.insert("range".into(), json!(range));
            }
            if let Some(order) = spec.y_category_order {
                yaxis.insert("categoryorder".into(), json!(order.as_str()));
            }
            if i > 0 {
                yaxis.insert("matches".into(), json!("y"));
            }

            layout.insert(axis_ref("xaxis", i), Value::Object(xaxis));
            layout.insert(axis_ref("yaxis", i), Value::Object(yaxis));

            if let (Some(facet), Some(value)) = (&spec.facet, self.facet_values.get(i)) {
                annotations.push(json!({
                    "text": format!("{}={}", spec.label(facet.column), value),
                    "x": round4(x0 + col_width / 2.0),
                    "y": domain_y[1],
                    "xref": "paper",
                    "yref": "paper",
                    "xanchor": "center",
                    "yanchor": "bottom",
                    "showarrow": false,
                }));
            }
        }
        if !annotations.is_empty() {
            layout.insert("annotations".into(), Value::Array(annotations));
        }

        if let Some(column) = spec.animation_frame {
            if !self.frame_values.is_empty() {
                self.add_animation_controls(&mut layout, column);
            }
        }

        Value::Object(layout)
    }

    fn add_animation_controls(&self, layout: &mut Map<String, Value>, column: Column) {
        let spec = self.spec;
        let redraw = spec.kind == ChartKind::Bar;

        let play = json!({
            "label": "&#9654;",
            "method": "animate",
            "args": [null, {
                "frame": { "duration": spec.frame_duration_ms, "redraw": redraw },
                "mode": "immediate",
                "fromcurrent": true,
                "transition": { "duration": spec.transition_duration_ms, "easing": "linear" },
            }],
        });
        let pause = json!({
            "label": "&#9724;",
            "method": "animate",
            "args": [[null], {
                "frame": { "duration": 0, "redraw": redraw },
                "mode": "immediate",
                "fromcurrent": true,
                "transition": { "duration": 0, "easing": "linear" },
            }],
        });
        layout.insert(
            "updatemenus".into(),
            json!([{
                "type": "buttons",
                "direction": "left",
                "showactive": false,
                "x": 0.1,
                "y": 0,
                "xanchor": "right",
                "yanchor": "top",
                "pad": { "r": 10, "t": 70 },
                "buttons": [play, pause],
            }]),
        );

        let steps: Vec<Value> = self
            .frame_values
            .iter()
            .map(|value| {
                json!({
                    "label": value,
                    "method": "animate",
                    "args": [[value], {
                        "frame": { "duration": 0, "redraw": redraw },
                        "mode": "immediate",
                        "fromcurrent": true,
                        "transition": { "duration": 0, "easing": "linear" },
                    }],
                })
            })
            .collect();
        layout.insert(
            "sliders".into(),
            json!([{
                "active": 0,
                "currentvalue": { "prefix": format!("{}=", spec.label(column)) },
                "len": 0.9,
                "x": 0.1,
                "xanchor": "left",
                "y": 0,
                "yanchor": "top",
                "pad": { "b": 10, "t": 60 },
                "steps": steps,
            }]),
        );
    }
}

/// `x`, `x2`, `x3`, ... for facet 0, 1, 2, ... (also `xaxis`, `xaxis2`, ...)
fn axis_ref(axis: &str, facet: usize) -> String {
    if facet == 0 {
        axis.to_string()
    } else {
        format!("{}{}", axis, facet + 1)
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn column_values(rows: &[&AggregatedRow], column: Column) -> Value {
    Value::Array(rows.iter().map(|r| column.value(r).to_json()).collect())
}

/// Distinct labels of `column` in order of first appearance.
fn distinct_labels(rows: &[AggregatedRow], column: Column) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| column.value(r).to_string())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

/// Distinct labels of `column` in ascending value order.
fn sorted_labels(rows: &[AggregatedRow], column: Column) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut values: Vec<CellValue> = rows
        .iter()
        .map(|r| column.value(r))
        .filter(|v| seen.insert(v.to_string()))
        .collect();
    values.sort_by(|a, b| match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    });
    values.into_iter().map(|v| v.to_string()).collect()
}

/// Wrap a figure in a standalone HTML page that loads plotly.js from `plotly_js_url`.
pub fn render_html(
    figure: &Figure,
    title: &str,
    plotly_js_url: &str,
) -> Result<String, serde_json::Error> {
    // keep "</script>" inside string values from closing the script element
    let payload = serde_json::to_string(figure)?.replace("</", "<\\/");

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{src}"></script>
</head>
<body>
<div id="serpbeat-chart"></div>
<script>
const figure = {payload};
Plotly.newPlot("serpbeat-chart", figure.data, figure.layout).then(function () {{
  if (figure.frames.length) {{
    Plotly.addFrames("serpbeat-chart", figure.frames);
  }}
}});
</script>
</body>
</html>
"#,
        title = html_escape(title),
        src = html_escape(plotly_js_url),
        payload = payload,
    ))
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
