//! Telemetry acquisition
//!
//! Turns raw UART lines into validated readings:
//! - `line_parser`: matches prediction reports, rejects everything else
//! - `validator`: SpO2 clamping and informational tags
//! - `serial` / `discovery`: finding and opening the USB-UART bridge

pub mod discovery;
pub mod line_parser;
pub mod serial;
pub mod validator;

pub use discovery::{discover_port, PortCandidate, DEFAULT_PORT_PATTERNS};
pub use line_parser::{parse_reading, LineParser, ParseOutcome, PREDICTION_MARKER};
pub use serial::{open_serial, SerialSettings, TransportError};
pub use validator::validate;
