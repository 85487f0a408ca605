//! Declarative chart descriptions.
//!
//! A `Chart` names its traces, axes, and title and nothing more; the dashboard hands it to a
//! Plotly-compatible renderer as-is.

use serde::Serialize;

use crate::metrics::MetricRows;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    /// Category axis values
    pub x: Vec<String>,

    /// Numeric values, one per category
    pub y: Vec<f64>,

    #[serde(rename = "type")]
    pub trace_type: TraceType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,

    /// The value axis this trace is drawn against, when not the primary one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    Bar,
    Scatter,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub title: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis2: Option<Axis>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Axis {
    pub overlaying: &'static str,
    pub side: &'static str,
}

impl Trace {
    fn bar(x: Vec<String>, y: Vec<f64>) -> Self {
        Trace {
            x,
            y,
            trace_type: TraceType::Bar,
            mode: None,
            name: None,
            yaxis: None,
        }
    }
}

/// Describe the chart for a metric's rows.
pub fn chart_for(rows: &MetricRows) -> Chart {
    match rows {
        MetricRows::Commits(rows) => Chart {
            data: vec![Trace::bar(
                rows.iter().map(|r| r.author.clone()).collect(),
                rows.iter().map(|r| r.commits as f64).collect(),
            )],
            layout: Layout {
                title: "Commits by Developer",
                yaxis2: None,
            },
        },

        MetricRows::Prs(rows) => {
            let authors: Vec<String> = rows.iter().map(|r| r.author.clone()).collect();
            let counts = Trace {
                name: Some("PRs"),
                ..Trace::bar(authors.clone(), rows.iter().map(|r| r.prs as f64).collect())
            };
            let merge_times = Trace {
                x: authors,
                y: rows.iter().map(|r| r.avg_merge_time).collect(),
                trace_type: TraceType::Scatter,
                mode: Some("lines+markers"),
                name: Some("Average Merge Time (h)"),
                yaxis: Some("y2"),
            };
            Chart {
                data: vec![counts, merge_times],
                layout: Layout {
                    title: "Pull Requests and Merge Time",
                    yaxis2: Some(Axis {
                        overlaying: "y",
                        side: "right",
                    }),
                },
            }
        }

        MetricRows::Releases(rows) => Chart {
            data: vec![Trace::bar(
                rows.iter().map(|r| r.repo.clone()).collect(),
                rows.iter().map(|r| r.releases as f64).collect(),
            )],
            layout: Layout {
                title: "Releases by Repository",
                yaxis2: None,
            },
        },
    }
}
