use std::io;

use thiserror::Error;

/// Failure of a single status query against one target.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,
    #[error("connection refused")]
    Refused,
    #[error("network error: {0}")]
    Network(io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ProbeError {
    /// Transport-level failures are worth another attempt; everything else abandons the target.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::Timeout | ProbeError::Refused | ProbeError::Network(_)
        )
    }
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => ProbeError::Timeout,
            io::ErrorKind::ConnectionRefused => ProbeError::Refused,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                ProbeError::Protocol(err.to_string())
            }
            _ => ProbeError::Network(err),
        }
    }
}

/// Rejected input, reported before any probing starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("port out of range: {0}")]
    PortOutOfRange(u32),
    #[error("invalid port value: {0}")]
    InvalidPort(String),
    #[error("invalid range {start}-{end} (start > end)")]
    InvertedRange { start: u16, end: u16 },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,
    #[error("retries must be at least 1")]
    ZeroRetries,
    #[error("rescan interval must be between 1 and 1440 minutes, got {0:?}")]
    InvalidInterval(String),
    #[error("unknown core kind: {0}")]
    UnknownCoreKind(String),
    #[error("no history entry at index {0}")]
    UnknownHistoryEntry(usize),
}

/// Scan-level failure, distinct from individual probe misses.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan request: {0}")]
    Config(#[from] ConfigError),
    #[error("scan session aborted: {0}")]
    Session(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transport_kinds() {
        let refused = ProbeError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(refused, ProbeError::Refused));
        assert!(refused.is_transient());

        let reset = ProbeError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(reset, ProbeError::Network(_)));
        assert!(reset.is_transient());
    }

    #[test]
    fn malformed_payloads_are_not_retried() {
        let eof = ProbeError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(eof, ProbeError::Protocol(_)));
        assert!(!eof.is_transient());
        assert!(!ProbeError::Unexpected("boom".into()).is_transient());
    }
}
