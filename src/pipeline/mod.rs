//! Telemetry ingestion pipeline
//!
//! - `source`: line transports (serial, stdin, replay) and their connectors
//! - `rolling_buffer`: bounded live-display buffer
//! - `state`: connection state, counters, diagnostic log
//! - `control`: commands, events and the cloneable [`ControlHandle`]
//! - `monitor`: the ingestion loop that ties them together

pub mod control;
pub mod monitor;
pub mod rolling_buffer;
pub mod source;
pub mod state;

pub use control::{ControlCommand, ControlError, ControlHandle, MonitorEvent};
pub use monitor::{Monitor, MonitorSettings};
pub use rolling_buffer::{DisplayRange, RollingBuffer, SharedBuffer};
pub use source::{
    Connector, LineEvent, LineReader, LineSource, ReplayConnector, ReplaySource, SerialConnector,
    SerialSource, StdinConnector, StdinSource,
};
pub use state::{
    ConnectionState, DiagnosticLine, DiagnosticLog, MonitorState, SharedDiagnostics, SharedState,
};
