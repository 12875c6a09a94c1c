//! Durable telemetry storage
//!
//! Pending records are batched in memory by [`PersistenceBatcher`] and
//! flushed to a [`RecordSink`]. The production sink is [`DailyCsvLog`], one
//! CSV per calendar day grouped in per-month directories.

pub mod batcher;
pub mod columns;
pub mod daily_log;
pub mod history;
pub mod lockfile;
pub mod persistence;

pub use batcher::{FlushOutcome, FlushReport, PersistenceBatcher};
pub use columns::{normalize_header, ColumnMap, LogColumn};
pub use daily_log::DailyCsvLog;
pub use history::{list_days, load_day, load_file, DayLog, HistoryError, HistoryRow};
pub use lockfile::DataDirLock;
pub use persistence::{MemorySink, Partition, PersistenceError, RecordSink};
