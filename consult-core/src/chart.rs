//! Declarative chart specifications for the air-quality and temperature views.
//!
//! Figures serialize to the JSON shape Plotly accepts (`data` + `layout`).
//! Nothing here fetches data; a figure is a pure function of the merged table
//! and the reference instant.

use serde::Serialize;

use crate::environment::EnvironmentalTable;
use crate::timestamp::Timestamp;

const NOW_LINE_COLOR: &str = "#2f2f2d";
const FONT_FAMILY: &str = "Montserrat";
const ONE_DAY_MS: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiBand {
    pub lower: f64,
    pub upper: f64,
    pub color: &'static str,
    pub level: &'static str,
}

/// US EPA severity bands
pub const AQI_BANDS: [AqiBand; 6] = [
    AqiBand {
        lower: 0.0,
        upper: 50.0,
        color: "green",
        level: "Good",
    },
    AqiBand {
        lower: 50.0,
        upper: 100.0,
        color: "yellow",
        level: "Moderate",
    },
    AqiBand {
        lower: 100.0,
        upper: 150.0,
        color: "orange",
        level: "Unhealthy for Sensitive Groups",
    },
    AqiBand {
        lower: 150.0,
        upper: 200.0,
        color: "red",
        level: "Unhealthy",
    },
    AqiBand {
        lower: 200.0,
        upper: 300.0,
        color: "purple",
        level: "Very Unhealthy",
    },
    AqiBand {
        lower: 300.0,
        upper: 500.0,
        color: "maroon",
        level: "Hazardous",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    pub name: String,
    pub x: Vec<Timestamp>,
    pub y: Vec<f64>,
    pub mode: &'static str,
    pub line: Line,
    pub showlegend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub color: &'static str,
    pub width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<&'static str>,
}

/// Shape coordinate: a fraction of the plotting area or an instant on the time axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Coordinate {
    Paper(f64),
    Time(Timestamp),
    Value(f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub shape_type: &'static str,
    pub xref: &'static str,
    pub yref: &'static str,
    pub x0: Coordinate,
    pub x1: Coordinate,
    pub y0: Coordinate,
    pub y1: Coordinate,
    pub layer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    pub line: ShapeLine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub label: ShapeLabel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeLine {
    pub color: &'static str,
    pub width: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeLabel {
    pub text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textangle: Option<f64>,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub shapes: Vec<Shape>,
    pub showlegend: bool,
    pub legend: Legend,
    pub hovermode: &'static str,
    pub font: Font,
    pub plot_bgcolor: &'static str,
    pub paper_bgcolor: &'static str,
    pub margin: Margin,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: &'static str,
    pub font: Font,
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub family: &'static str,
    pub size: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Axis {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickvals: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    pub zeroline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor: Option<MinorTicks>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinorTicks {
    pub dtick: f64,
    pub ticks: &'static str,
    pub ticklen: u32,
    pub tickcolor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Legend {
    pub itemclick: bool,
    pub itemdoubleclick: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

/// Split a time series at `now`. History holds `ts <= now`, forecast holds
/// `ts >= now`; a point exactly at `now` lands in both so the two traces meet.
pub fn split_at(
    points: &[(Timestamp, f64)],
    now: Timestamp,
) -> (Vec<(Timestamp, f64)>, Vec<(Timestamp, f64)>) {
    let history = points.iter().copied().filter(|(ts, _)| *ts <= now).collect();
    let forecast = points.iter().copied().filter(|(ts, _)| *ts >= now).collect();
    (history, forecast)
}

fn line_trace(
    name: &str,
    points: Vec<(Timestamp, f64)>,
    color: &'static str,
    dotted: bool,
) -> Trace {
    let (x, y) = points.into_iter().unzip();
    Trace {
        trace_type: "scatter",
        name: name.to_string(),
        x,
        y,
        mode: "lines",
        line: Line {
            color,
            width: 2,
            dash: dotted.then_some("dot"),
        },
        showlegend: true,
    }
}

fn split_traces(
    label: &str,
    points: &[(Timestamp, f64)],
    now: Timestamp,
    color: &'static str,
) -> [Trace; 2] {
    let (history, forecast) = split_at(points, now);
    [
        line_trace(&format!("{} History", label), history, color, false),
        line_trace(&format!("{} Forecast", label), forecast, color, true),
    ]
}

fn now_marker(now: Timestamp, y0: f64, y1: f64) -> Shape {
    Shape {
        shape_type: "line",
        xref: "x",
        yref: "y",
        x0: Coordinate::Time(now),
        x1: Coordinate::Time(now),
        y0: Coordinate::Value(y0),
        y1: Coordinate::Value(y1),
        layer: "above",
        fillcolor: None,
        opacity: None,
        line: ShapeLine {
            color: NOW_LINE_COLOR,
            width: 3,
        },
        name: None,
        label: ShapeLabel {
            text: "NOW",
            textposition: None,
            textangle: Some(0.0),
            xanchor: "left",
            yanchor: "middle",
            padding: Some(5),
        },
    }
}

fn band_shape(band: &AqiBand) -> Shape {
    Shape {
        shape_type: "rect",
        xref: "paper",
        yref: "y",
        x0: Coordinate::Paper(0.0),
        x1: Coordinate::Paper(1.0),
        y0: Coordinate::Value(band.lower),
        y1: Coordinate::Value(band.upper),
        layer: "below",
        fillcolor: Some(band.color),
        opacity: Some(0.66),
        line: ShapeLine {
            color: band.color,
            width: 0,
        },
        name: Some(band.level),
        label: ShapeLabel {
            text: band.level,
            textposition: Some("top left"),
            textangle: None,
            xanchor: "left",
            yanchor: "top",
            padding: None,
        },
    }
}

fn base_layout(shapes: Vec<Shape>, yaxis: Axis, plot_bgcolor: &'static str) -> Layout {
    Layout {
        title: None,
        xaxis: Axis {
            axis_type: Some("date"),
            tickformat: Some("%B %-e"),
            zeroline: false,
            minor: Some(MinorTicks {
                dtick: ONE_DAY_MS,
                ticks: "inside",
                ticklen: 5,
                tickcolor: "black",
            }),
            ..Axis::default()
        },
        yaxis,
        shapes,
        showlegend: true,
        legend: Legend {
            itemclick: false,
            itemdoubleclick: false,
        },
        hovermode: "x",
        font: Font {
            family: FONT_FAMILY,
            size: 13,
            color: "black",
        },
        plot_bgcolor,
        paper_bgcolor: "#F1F1F1",
        margin: Margin { l: 70, r: 70, t: 0, b: 42 },
    }
}

/// AQI over time with severity bands and a marker at `now`
pub fn aqi_chart(table: &EnvironmentalTable, now: Timestamp) -> Figure {
    let points = table.aqi_points();
    let mut traces = Vec::from(split_traces("AQI", &points, now, "black"));
    for trace in &mut traces {
        trace.showlegend = false;
    }

    let mut shapes: Vec<Shape> = AQI_BANDS.iter().map(band_shape).collect();
    shapes.push(now_marker(now, 0.0, 500.0));

    let yaxis = Axis {
        tickmode: Some("array"),
        tickvals: Some(vec![0.0, 50.0, 100.0, 150.0, 200.0, 300.0, 500.0]),
        zeroline: false,
        ..Axis::default()
    };

    let mut layout = base_layout(shapes, yaxis, "white");
    layout.title = Some(Title {
        text: "Air Quality History and Forecast",
        font: Font {
            family: FONT_FAMILY,
            size: 17,
            color: "black",
        },
    });
    Figure {
        data: traces,
        layout,
    }
}

/// Temperature and apparent temperature over time, split at `now`
pub fn temperature_chart(table: &EnvironmentalTable, now: Timestamp) -> Figure {
    let temperature = table.temperature_points();
    let apparent = table.apparent_temperature_points();

    let mut traces = Vec::with_capacity(4);
    traces.extend(split_traces("Temperature", &temperature, now, "black"));
    traces.extend(split_traces("\"Feels like\"", &apparent, now, "red"));

    let bounds = temperature
        .iter()
        .chain(apparent.iter())
        .map(|(_, v)| *v)
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });

    let shapes = bounds
        .map(|(lo, hi)| vec![now_marker(now, lo, hi)])
        .unwrap_or_default();

    let yaxis = Axis {
        tickmode: Some("auto"),
        range: bounds.map(|(lo, hi)| [lo, hi]),
        zeroline: false,
        ..Axis::default()
    };

    Figure {
        data: traces,
        layout: base_layout(shapes, yaxis, "#F1F1F1"),
    }
}
