//! Shared data structures for the vital-sign telemetry pipeline
//!
//! - `ParsedFields` / `Reading`: parser output and the validated sample
//! - `StatusLabel` / `Severity` / `ClassifiedStatus`: classification output
//! - `AlarmConfig`: operator-adjustable alarm threshold
//! - `TelemetryRecord`: the persisted form of a classified reading

mod reading;
mod record;
mod status;

pub use reading::*;
pub use record::*;
pub use status::*;
