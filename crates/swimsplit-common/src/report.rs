//! Lap aggregation.
//!
//! Turns the platform's `lapDTOs` into the Garmin-style splits table: one row
//! per whole lap in index order, a summary row and a link row.

use crate::formatter::{format_number, format_optional, format_pace, format_time};
use crate::laps::{RawLap, RawLength};
use serde::Serialize;
use tracing::warn;

/// Text emitted instead of a table when the activity has no laps.
pub const NO_LAP_DATA: &str = "No lap data found.";

pub const COLUMNS: [&str; 15] = [
    "",
    "Intervals",
    "Swim Stroke",
    "Lengths",
    "Distance",
    "Time",
    "Cumulative Time",
    "Avg Pace",
    "Best Pace",
    "Avg. Swolf",
    "Avg HR",
    "Max HR",
    "Total Strokes",
    "Avg Strokes",
    "Calories",
];

/// Leading cell of every data row. The export writes a literal pair of quotes.
pub const ROW_MARKER: &str = "\"\"";

const MIXED_STROKE: &str = "Mixed";
const NO_STROKE: &str = "--";

pub const ACTIVITY_URL_PREFIX: &str = "https://connect.garmin.com/modern/activity/";

pub fn activity_url(activity_id: &str) -> String {
    format!("{}{}", ACTIVITY_URL_PREFIX, activity_id)
}

/// A whole lap with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLap {
    pub raw: RawLap,
    /// Seconds per 100, unset when the lap has no positive average speed.
    pub avg_pace: Option<f64>,
    /// Fastest length of the lap in seconds per 100.
    pub best_pace: Option<f64>,
    pub stroke: String,
    pub lengths: Option<u32>,
    /// Elapsed time up to and including this lap.
    pub cumulative: f64,
}

impl AggregatedLap {
    fn from_raw(raw: &RawLap, previous_cumulative: f64) -> Self {
        let avg_pace = raw
            .average_speed
            .filter(|speed| *speed > 0.0)
            .map(|speed| 100.0 / speed);
        let stroke = match raw.swim_stroke.as_deref() {
            Some(stroke) if !stroke.is_empty() => stroke.to_string(),
            _ => resolve_stroke(raw.lengths()),
        };
        let lengths = raw
            .active_lengths()
            .or_else(|| raw.length_dtos.as_ref().map(|l| l.len() as u32));

        Self {
            raw: raw.clone(),
            avg_pace,
            best_pace: best_pace(raw.lengths()),
            stroke,
            lengths,
            cumulative: previous_cumulative + raw.duration.unwrap_or(0.0),
        }
    }

    pub fn cells(&self) -> Vec<String> {
        let raw = &self.raw;
        vec![
            ROW_MARKER.to_string(),
            raw.lap_index
                .as_ref()
                .map(|index| index.to_string())
                .unwrap_or_default(),
            self.stroke.clone(),
            self.lengths.map(|n| n.to_string()).unwrap_or_default(),
            format_optional(raw.distance),
            raw.duration.map(format_time).unwrap_or_default(),
            format_time(self.cumulative),
            self.avg_pace.map(format_pace).unwrap_or_default(),
            self.best_pace.map(format_pace).unwrap_or_default(),
            format_optional(raw.average_swolf),
            format_optional(raw.average_hr),
            format_optional(raw.max_hr),
            format_optional(raw.total_number_of_strokes),
            format_optional(raw.average_strokes),
            format_optional(raw.calories),
        ]
    }
}

/// Minimum per-length pace, ignoring lengths without distance or duration.
pub fn best_pace(lengths: &[RawLength]) -> Option<f64> {
    lengths
        .iter()
        .filter_map(RawLength::pace)
        .fold(None, |best, pace| match best {
            Some(b) if b <= pace => Some(b),
            _ => Some(pace),
        })
}

/// Stroke of a lap derived from its lengths: the single distinct stroke,
/// `Mixed` when several appear, empty when none is recorded.
pub fn resolve_stroke(lengths: &[RawLength]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for stroke in lengths.iter().filter_map(|l| l.swim_stroke.as_deref()) {
        if stroke.is_empty() || stroke == NO_STROKE {
            continue;
        }
        if !seen.contains(&stroke) {
            seen.push(stroke);
        }
    }
    match seen.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        _ => MIXED_STROKE.to_string(),
    }
}

/// Running totals over the aggregated laps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub count: usize,
    pub lengths: u64,
    pub distance: f64,
    pub duration: f64,
    pub avg_pace_sum: f64,
    /// `f64::INFINITY` until some lap has a best pace.
    pub best_pace: f64,
    pub avg_swolf_sum: f64,
    pub avg_hr_sum: f64,
    pub max_hr: f64,
    pub total_strokes: f64,
    pub avg_strokes_sum: f64,
    pub calories: f64,
}

impl Default for ReportSummary {
    fn default() -> Self {
        Self {
            count: 0,
            lengths: 0,
            distance: 0.0,
            duration: 0.0,
            avg_pace_sum: 0.0,
            best_pace: f64::INFINITY,
            avg_swolf_sum: 0.0,
            avg_hr_sum: 0.0,
            max_hr: 0.0,
            total_strokes: 0.0,
            avg_strokes_sum: 0.0,
            calories: 0.0,
        }
    }
}

impl ReportSummary {
    pub fn add(&mut self, lap: &AggregatedLap) {
        let raw = &lap.raw;
        self.count += 1;
        self.lengths += u64::from(lap.lengths.unwrap_or(0));
        self.distance += raw.distance.unwrap_or(0.0);
        self.duration += raw.duration.unwrap_or(0.0);
        self.avg_pace_sum += lap.avg_pace.unwrap_or(0.0);
        if let Some(best) = lap.best_pace {
            self.best_pace = self.best_pace.min(best);
        }
        self.avg_swolf_sum += raw.average_swolf.unwrap_or(0.0);
        self.avg_hr_sum += raw.average_hr.unwrap_or(0.0);
        if let Some(max_hr) = raw.max_hr {
            self.max_hr = self.max_hr.max(max_hr);
        }
        self.total_strokes += raw.total_number_of_strokes.unwrap_or(0.0);
        self.avg_strokes_sum += raw.average_strokes.unwrap_or(0.0);
        self.calories += raw.calories.unwrap_or(0.0);
    }

    /// Rounded mean of `sum`; empty when there is nothing to average or the
    /// mean rounds to zero.
    fn rounded_mean(&self, sum: f64) -> String {
        if self.count == 0 {
            return String::new();
        }
        let mean = (sum / self.count as f64).round();
        if mean == 0.0 || !mean.is_finite() {
            String::new()
        } else {
            format_number(mean)
        }
    }

    pub fn cells(&self) -> Vec<String> {
        let avg_pace = if self.count == 0 {
            String::new()
        } else {
            format_pace(self.avg_pace_sum / self.count as f64)
        };
        let best_pace = if self.best_pace.is_finite() {
            format_pace(self.best_pace)
        } else {
            String::new()
        };

        vec![
            ROW_MARKER.to_string(),
            "Summary".to_string(),
            NO_STROKE.to_string(),
            self.lengths.to_string(),
            format_number(self.distance),
            format_time(self.duration),
            format_time(self.duration),
            avg_pace,
            best_pace,
            self.rounded_mean(self.avg_swolf_sum),
            self.rounded_mean(self.avg_hr_sum),
            format_number(self.max_hr),
            format_number(self.total_strokes),
            self.rounded_mean(self.avg_strokes_sum),
            format_number(self.calories),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportLine {
    Placeholder,
    Header,
    Lap(Vec<String>),
    Summary(Vec<String>),
    Link(Vec<String>),
}

impl ReportLine {
    pub fn cells(&self) -> Vec<String> {
        match self {
            ReportLine::Placeholder => vec![NO_LAP_DATA.to_string()],
            ReportLine::Header => COLUMNS.iter().map(|c| c.to_string()).collect(),
            ReportLine::Lap(cells) | ReportLine::Summary(cells) | ReportLine::Link(cells) => {
                cells.clone()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub activity_id: String,
    pub laps: Vec<AggregatedLap>,
    pub summary: Option<ReportSummary>,
    pub lines: Vec<ReportLine>,
}

impl Report {
    pub fn is_placeholder(&self) -> bool {
        self.summary.is_none()
    }
}

fn link_cells(activity_id: &str) -> Vec<String> {
    let mut cells = vec![
        ROW_MARKER.to_string(),
        "Link".to_string(),
        activity_url(activity_id),
    ];
    cells.resize(COLUMNS.len(), String::new());
    cells
}

/// Aggregate `laps` into the splits table for `activity_id`.
///
/// Fractional and index-less laps are dropped, the rest are ordered by index. An empty input
/// yields the placeholder report rather than an error.
pub fn build_report(laps: &[RawLap], activity_id: &str) -> Report {
    if laps.is_empty() {
        return Report {
            activity_id: activity_id.to_string(),
            laps: Vec::new(),
            summary: None,
            lines: vec![ReportLine::Placeholder],
        };
    }

    let mut whole: Vec<(f64, &RawLap)> = laps
        .iter()
        .filter_map(|lap| match &lap.lap_index {
            Some(index) => index.is_whole().then(|| (index.sort_key(), lap)),
            None => {
                warn!("Skipping lap without lapIndex");
                None
            }
        })
        .collect();
    whole.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let mut summary = ReportSummary::default();
    let mut aggregated = Vec::with_capacity(whole.len());
    let mut cumulative = 0.0;
    for (_, raw) in whole {
        let lap = AggregatedLap::from_raw(raw, cumulative);
        cumulative = lap.cumulative;
        summary.add(&lap);
        aggregated.push(lap);
    }

    let mut lines = Vec::with_capacity(aggregated.len() + 3);
    lines.push(ReportLine::Header);
    lines.extend(aggregated.iter().map(|lap| ReportLine::Lap(lap.cells())));
    lines.push(ReportLine::Summary(summary.cells()));
    lines.push(ReportLine::Link(link_cells(activity_id)));

    Report {
        activity_id: activity_id.to_string(),
        laps: aggregated,
        summary: Some(summary),
        lines,
    }
}
