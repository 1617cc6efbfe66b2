//! Wire model of the splits endpoint.
//!
//! Every numeric field is optional: the platform omits whatever it did not
//! record for a given interval. Fields not modelled here are kept in `extra`
//! so the raw collection can be handed back unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lap index as sent by the platform.
///
/// Whole numbers are real laps; fractional values (`1.1`, `"2.3"`) are
/// sub-splits of the lap they hang off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LapIndex {
    Number(f64),
    Text(String),
}

impl LapIndex {
    pub fn is_whole(&self) -> bool {
        match self {
            LapIndex::Number(n) => n.is_finite() && n.fract() == 0.0,
            LapIndex::Text(s) => !s.contains('.'),
        }
    }

    /// Numeric ordering key. Text that does not parse sorts last.
    pub fn sort_key(&self) -> f64 {
        match self {
            LapIndex::Number(n) => *n,
            LapIndex::Text(s) => s.trim().parse().unwrap_or(f64::INFINITY),
        }
    }
}

impl fmt::Display for LapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LapIndex::Number(n) => write!(f, "{}", n),
            LapIndex::Text(s) => f.write_str(s),
        }
    }
}

/// One pool length inside a lap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLength {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swim_stroke: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawLength {
    /// Seconds per 100 distance units, when the length carries enough data.
    pub fn pace(&self) -> Option<f64> {
        match (self.distance, self.duration) {
            (Some(distance), Some(duration)) if distance > 0.0 && duration != 0.0 => {
                Some(duration / distance * 100.0)
            }
            _ => None,
        }
    }
}

/// One interval as returned in `lapDTOs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLap {
    /// Laps without an index are skipped when the report is built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lap_index: Option<LapIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swim_stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "averageHR")]
    pub average_hr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "maxHR")]
    pub max_hr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "averageSWOLF")]
    pub average_swolf: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_number_of_strokes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_strokes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// Sent as an integer, though some payloads carry it as `4.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_active_lengths: Option<f64>,
    #[serde(default, rename = "lengthDTOs", skip_serializing_if = "Option::is_none")]
    pub length_dtos: Option<Vec<RawLength>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawLap {
    /// A lap with only an index set. Handy for building fixtures.
    pub fn new(lap_index: LapIndex) -> Self {
        Self {
            lap_index: Some(lap_index),
            start_time_gmt: None,
            distance: None,
            duration: None,
            average_speed: None,
            swim_stroke: None,
            average_hr: None,
            max_hr: None,
            average_swolf: None,
            total_number_of_strokes: None,
            average_strokes: None,
            calories: None,
            number_of_active_lengths: None,
            length_dtos: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn lengths(&self) -> &[RawLength] {
        self.length_dtos.as_deref().unwrap_or_default()
    }

    /// Active length count, when the platform sent a usable one.
    pub fn active_lengths(&self) -> Option<u32> {
        self.number_of_active_lengths
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_index_detection() {
        assert!(LapIndex::Number(3.0).is_whole());
        assert!(!LapIndex::Number(3.5).is_whole());
        assert!(LapIndex::Text("4".into()).is_whole());
        assert!(!LapIndex::Text("4.1".into()).is_whole());
    }

    #[test]
    fn test_deserialize_platform_lap() {
        let json = r#"{
            "lapIndex": 1,
            "startTimeGMT": "2025-04-13T07:01:02.0",
            "distance": 100.0,
            "duration": 95.4,
            "averageSpeed": 1.05,
            "averageHR": 131.0,
            "maxHR": 140.0,
            "averageSWOLF": 38.0,
            "numberOfActiveLengths": 4,
            "messageIndex": 0,
            "lengthDTOs": [{"distance": 25.0, "duration": 24.1, "swimStroke": "FREESTYLE"}]
        }"#;
        let lap: RawLap = serde_json::from_str(json).unwrap();
        assert_eq!(lap.lap_index, Some(LapIndex::Number(1.0)));
        assert_eq!(lap.average_hr, Some(131.0));
        assert_eq!(lap.active_lengths(), Some(4));
        assert_eq!(lap.lengths().len(), 1);
        assert_eq!(lap.extra.get("messageIndex"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn test_lenient_index_and_length_count() {
        let no_index: RawLap = serde_json::from_str(r#"{"duration": 5.0}"#).unwrap();
        assert_eq!(no_index.lap_index, None);

        let float_count: RawLap =
            serde_json::from_str(r#"{"lapIndex": 1, "numberOfActiveLengths": 4.0}"#).unwrap();
        assert_eq!(float_count.active_lengths(), Some(4));

        let negative: RawLap =
            serde_json::from_str(r#"{"lapIndex": 2, "numberOfActiveLengths": -1}"#).unwrap();
        assert_eq!(negative.active_lengths(), None);
    }

    #[test]
    fn test_length_pace_requires_distance_and_duration() {
        let length = RawLength {
            distance: Some(25.0),
            duration: Some(20.0),
            ..Default::default()
        };
        assert_eq!(length.pace(), Some(80.0));

        let no_distance = RawLength {
            distance: Some(0.0),
            duration: Some(20.0),
            ..Default::default()
        };
        assert_eq!(no_distance.pace(), None);

        let no_duration = RawLength {
            distance: Some(25.0),
            ..Default::default()
        };
        assert_eq!(no_duration.pace(), None);
    }
}
