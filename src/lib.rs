//! vitals-monitor: wearable heart monitor telemetry ingestion
//!
//! Reads the monitor's UART stream, turns prediction reports into validated
//! readings, classifies them for presentation, keeps a rolling buffer for
//! live display and appends every reading to a per-day CSV log.
//!
//! ## Architecture
//!
//! - **acquisition**: line parser, reading validator, serial port discovery
//! - **classification**: label/severity derivation with the high-BPM override
//! - **pipeline**: transports, rolling buffer, control surface, ingestion loop
//! - **storage**: persistence batcher, daily CSV log, history loader
//! - **api**: HTTP/WebSocket adapter for front-ends

pub mod acquisition;
pub mod api;
pub mod classification;
pub mod config;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::MonitorConfig;

pub use types::{
    AlarmConfig, ClassifiedStatus, ParsedFields, Reading, Severity, StatusLabel, TelemetryRecord,
    ValidationTags,
};

pub use acquisition::{parse_reading, validate, LineParser, ParseOutcome};
pub use classification::classify;

pub use pipeline::{ControlError, ControlHandle, Monitor, MonitorEvent, MonitorSettings};

pub use storage::{DailyCsvLog, FlushOutcome, PersistenceBatcher, PersistenceError, RecordSink};
