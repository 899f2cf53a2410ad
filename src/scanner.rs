use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::error::{ConfigError, ScanError};
use crate::limiter::ConcurrencyLimiter;
use crate::logging::ScanLog;
use crate::ports::{format_port_range, parse_port_range};
use crate::probe::{ProbeOutcome, ProbeWorker};
use crate::provider::StatusProvider;
use crate::types::{ProbeResult, ProbeTarget};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_RETRIES: u32 = 2;
/// Favorites are checked one at a time.
pub const FAVORITES_CONCURRENCY: usize = 1;

/// One sweep over a contiguous port range of a single host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    pub concurrency: usize,
    pub retries: u32,
}

impl ScanRequest {
    /// Build a validated request with the default timeout, concurrency and retries.
    pub fn new(host: impl Into<String>, start_port: u16, end_port: u16) -> Result<Self, ConfigError> {
        let request = Self {
            host: host.into().trim().to_string(),
            start_port,
            end_port,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            retries: DEFAULT_RETRIES,
        };
        request.validate()?;
        Ok(request)
    }

    /// Parse a `start-end` (or single port) range string.
    pub fn from_range_str(host: impl Into<String>, range: &str) -> Result<Self, ConfigError> {
        let (start, end) = parse_port_range(range)?;
        Self::new(host, start, end)
    }

    /// A one-port request for a single target, checked with concurrency 1.
    pub fn single(target: &ProbeTarget) -> Self {
        Self {
            host: target.host.clone(),
            start_port: target.port,
            end_port: target.port,
            timeout: DEFAULT_TIMEOUT,
            concurrency: FAVORITES_CONCURRENCY,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidTarget("empty host".into()));
        }
        if self.start_port == 0 {
            return Err(ConfigError::PortOutOfRange(0));
        }
        if self.start_port > self.end_port {
            return Err(ConfigError::InvertedRange {
                start: self.start_port,
                end: self.end_port,
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }

    pub fn total_ports(&self) -> u64 {
        if self.start_port > self.end_port {
            return 0;
        }
        u64::from(self.end_port - self.start_port) + 1
    }

    pub fn range_label(&self) -> String {
        format_port_range(self.start_port, self.end_port)
    }

    pub fn targets(&self) -> impl Iterator<Item = ProbeTarget> + '_ {
        (self.start_port..=self.end_port).map(move |port| ProbeTarget {
            host: self.host.clone(),
            port,
        })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Completion progress of one session.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ScanProgress {
    pub completed: u64,
    pub total: u64,
    pub percent: f64,
}

/// Consumer end of progress events; never blocks the probing pipeline.
pub type ProgressSender = mpsc::UnboundedSender<ScanProgress>;

/// Counts completions and emits progress; owned by the single fan-in loop.
pub(crate) struct ProgressTracker {
    completed: u64,
    total: u64,
    sink: Option<ProgressSender>,
}

impl ProgressTracker {
    /// Starts a fresh sequence at 0%.
    pub(crate) fn start(total: u64, sink: Option<ProgressSender>) -> Self {
        let tracker = Self {
            completed: 0,
            total,
            sink,
        };
        tracker.emit();
        tracker
    }

    pub(crate) fn advance(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
        self.emit();
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed
    }

    fn percent(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total if self.completed >= total => 100.0,
            total => self.completed as f64 / total as f64 * 100.0,
        }
    }

    fn emit(&self) {
        if let Some(sink) = &self.sink {
            // A gone receiver only means nobody is watching.
            let _ = sink.send(ScanProgress {
                completed: self.completed,
                total: self.total,
                percent: self.percent(),
            });
        }
    }
}

/// Outcome of a finished session plus its counters.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub found: u64,
    /// Targets dropped by a non-network failure.
    pub abandoned: u64,
    pub entries: Vec<ProbeResult>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Runs one sweep over a port range with bounded concurrency.
///
/// - Limits concurrent probes using a [`ConcurrencyLimiter`].
/// - Each probe retries transport failures and is bounded by the request timeout.
/// - Emits progress after every completed probe, whether or not it found a server.
/// - Returns entries sorted by target once every probe has finished.
#[derive(Clone)]
pub struct ScanSession {
    worker: ProbeWorker,
    log: ScanLog,
}

impl ScanSession {
    pub fn new(provider: Arc<dyn StatusProvider>, log: ScanLog) -> Self {
        Self {
            worker: ProbeWorker::new(provider, log.clone()),
            log: log.with_target("mc_scan::session"),
        }
    }

    pub async fn run(
        &self,
        request: &ScanRequest,
        progress: Option<ProgressSender>,
    ) -> Result<ScanReport, ScanError> {
        if let Err(e) = request.validate() {
            self.log
                .error(format_args!("rejected scan of {}: {e}", request.host));
            return Err(e.into());
        }

        let started = Instant::now();
        let total = request.total_ports();
        let limiter = ConcurrencyLimiter::new(request.concurrency);
        let tracker = ProgressTracker::start(total, progress);
        let mut set: JoinSet<ProbeOutcome> = JoinSet::new();

        self.log.debug(format_args!(
            "scanning {}:{} with concurrency {} (timeout {:?}, retries {})",
            request.host,
            request.range_label(),
            limiter.limit(),
            request.timeout,
            request.retries
        ));

        let mut fan_in = FanIn::new(tracker);
        for target in request.targets() {
            // Live tasks never exceed the limit; finished ones are drained while waiting.
            let acquired = loop {
                tokio::select! {
                    biased;
                    Some(joined) = set.join_next(), if !set.is_empty() => {
                        if let Err(e) = fan_in.absorb(joined) {
                            return Err(self.abort(request, e));
                        }
                    }
                    permit = limiter.acquire() => break permit,
                }
            };
            let permit = match acquired {
                Ok(permit) => permit,
                Err(e) => return Err(self.abort(request, e)),
            };

            let worker = self.worker.clone();
            let timeout = request.timeout;
            let retries = request.retries;
            set.spawn(async move {
                let _permit = permit; // held until the probe finishes
                worker.probe_outcome(&target, timeout, retries).await
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = fan_in.absorb(joined) {
                return Err(self.abort(request, e));
            }
        }

        let FanIn {
            mut entries,
            abandoned,
            tracker,
        } = fan_in;
        entries.sort_by(|a, b| a.target.cmp(&b.target));
        let report = ScanReport {
            scanned_total: total,
            scanned_done: tracker.completed(),
            found: entries.len() as u64,
            abandoned,
            entries,
            elapsed: started.elapsed(),
        };
        self.log.info(format_args!(
            "scan completed: {} servers, {} ports, {:.1} sec",
            report.found,
            report.scanned_done,
            report.elapsed.as_secs_f64()
        ));
        Ok(report)
    }

    fn abort(&self, request: &ScanRequest, err: ScanError) -> ScanError {
        self.log.error(format_args!(
            "scan of {}:{} aborted: {err}",
            request.host,
            request.range_label()
        ));
        err
    }
}

/// Collects finished probe tasks for one session.
struct FanIn {
    entries: Vec<ProbeResult>,
    abandoned: u64,
    tracker: ProgressTracker,
}

impl FanIn {
    fn new(tracker: ProgressTracker) -> Self {
        Self {
            entries: Vec::new(),
            abandoned: 0,
            tracker,
        }
    }

    fn absorb(&mut self, joined: Result<ProbeOutcome, JoinError>) -> Result<(), ScanError> {
        let outcome =
            joined.map_err(|e| ScanError::Session(format!("probe task failed: {e}")))?;
        match outcome {
            ProbeOutcome::Found(result) => self.entries.push(result),
            ProbeOutcome::Abandoned(_) => self.abandoned += 1,
            ProbeOutcome::Exhausted { .. } => {}
        }
        self.tracker.advance();
        Ok(())
    }
}
