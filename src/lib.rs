//! Library crate for mc-scan-rs: concurrent server status scanning with
//! favorites, history and periodic rescans.
pub mod aggregate;
pub mod error;
pub mod favorites;
pub mod limiter;
pub mod logging;
pub mod ports;
pub mod probe;
pub mod provider;
pub mod rounds;
pub mod scanner;
pub mod schedule;
pub mod store;
pub mod types;

pub use aggregate::{merge, AggregatedResultSet, ResultFilter, SortOrder};
pub use error::{ConfigError, ProbeError, ScanError};
pub use logging::ScanLog;
pub use provider::{StatusProvider, StatusRecord};
pub use scanner::{ScanProgress, ScanReport, ScanRequest, ScanSession};
pub use types::{CoreKind, Favicon, ProbeResult, ProbeTarget};
