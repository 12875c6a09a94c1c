//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Transport
// ============================================================================

/// Serial baud rate used by the monitor firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bound on a single transport read before the loop re-checks for commands (ms).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Upper bound accepted for `serial.read_timeout_ms`.
pub const MAX_READ_TIMEOUT_MS: u64 = 1_000;

/// Delay between lines when replaying a capture file (ms).
pub const DEFAULT_REPLAY_LINE_DELAY_MS: u64 = 100;

// ============================================================================
// Buffers
// ============================================================================

/// Rolling buffer capacity (readings).
///
/// 1 000 readings = ~16 minutes at the firmware's 1 Hz reporting rate.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000;

/// Most-recent readings used for display range scaling.
pub const DEFAULT_VISIBLE_WINDOW: usize = 100;

/// Raw non-reading lines kept for diagnostics.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 500;

/// Padding added either side of the heart-rate display range (bpm).
pub const DISPLAY_RANGE_PADDING_BPM: f64 = 5.0;

/// Spans narrower than this are widened around their midpoint (bpm).
pub const DISPLAY_RANGE_MIN_SPAN_BPM: f64 = 20.0;

/// Half-width of a widened display range (bpm).
pub const DISPLAY_RANGE_WIDENED_HALF_BPM: f64 = 15.0;

// ============================================================================
// Persistence
// ============================================================================

/// Root directory for day logs.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Interval between time-triggered flushes (seconds).
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 10;

/// Upper bound accepted for `persistence.flush_interval_secs` (one day).
pub const MAX_FLUSH_INTERVAL_SECS: u64 = 86_400;

/// Pending records kept while flushes fail before the oldest are dropped.
///
/// 100 000 readings = ~28 hours at 1 Hz.
pub const MAX_PENDING_RECORDS: usize = 100_000;

// ============================================================================
// Control surface / API
// ============================================================================

/// Control command queue depth.
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Broadcast capacity for monitor events; slower subscribers skip ahead.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Default HTTP bind address.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8090";
