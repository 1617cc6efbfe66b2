pub mod formatter;
pub mod laps;
pub mod report;
pub mod serializer;

pub use laps::{LapIndex, RawLap, RawLength};
pub use report::{AggregatedLap, Report, ReportLine, ReportSummary, build_report};
pub use serializer::{parse_rows, serialize_report};
