use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::error::ProbeError;
use crate::logging::ScanLog;
use crate::provider::StatusProvider;
use crate::types::{Favicon, ProbeResult, ProbeTarget};

/// How a single target's probe ended.
#[derive(Debug)]
pub enum ProbeOutcome {
    Found(ProbeResult),
    /// Every attempt hit a transport failure.
    Exhausted { attempts: u32 },
    /// A non-network failure stopped the probe early.
    Abandoned(ProbeError),
}

impl ProbeOutcome {
    pub fn into_result(self) -> Option<ProbeResult> {
        match self {
            ProbeOutcome::Found(result) => Some(result),
            _ => None,
        }
    }
}

/// Bounded-retry status probe of one (host, port).
#[derive(Clone)]
pub struct ProbeWorker {
    provider: Arc<dyn StatusProvider>,
    log: ScanLog,
}

impl ProbeWorker {
    pub fn new(provider: Arc<dyn StatusProvider>, log: ScanLog) -> Self {
        Self {
            provider,
            log: log.with_target("mc_scan::probe"),
        }
    }

    /// Probe `target` up to `retries` times; `None` when nothing answered.
    pub async fn probe(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
        retries: u32,
    ) -> Option<ProbeResult> {
        self.probe_outcome(target, timeout, retries)
            .await
            .into_result()
    }

    pub async fn probe_outcome(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
        retries: u32,
    ) -> ProbeOutcome {
        for attempt in 1..=retries {
            let reply = match time::timeout(
                timeout,
                self.provider.query(&target.host, target.port, timeout),
            )
            .await
            {
                Ok(reply) => reply,
                Err(_) => Err(ProbeError::Timeout),
            };

            match reply {
                Ok(record) => {
                    let favicon = match record.favicon() {
                        Some(icon) => Favicon::Present(icon.to_string()),
                        None => self.fetch_favicon(target, timeout).await,
                    };
                    let result = ProbeResult::from_status(target.clone(), record, favicon);
                    self.log.info(format_args!(
                        "found {} ({}, {}/{} players, favicon: {})",
                        target,
                        result.version,
                        result.players_online,
                        result.players_max,
                        if result.favicon.is_present() { "present" } else { "none" }
                    ));
                    return ProbeOutcome::Found(result);
                }
                Err(e) if e.is_transient() => {
                    self.log
                        .warn(format_args!("attempt {attempt} failed for {target}: {e}"));
                }
                Err(e) => {
                    self.log.error(format_args!("error scanning {target}: {e}"));
                    return ProbeOutcome::Abandoned(e);
                }
            }
        }

        self.log
            .warn(format_args!("all {retries} attempts failed for {target}"));
        ProbeOutcome::Exhausted { attempts: retries }
    }

    async fn fetch_favicon(&self, target: &ProbeTarget, timeout: Duration) -> Favicon {
        let fetched = time::timeout(
            timeout,
            self.provider
                .query_favicon(&target.host, target.port, timeout),
        )
        .await
        .unwrap_or(Err(ProbeError::Timeout));

        match fetched {
            Ok(Some(icon)) if !icon.trim().is_empty() => {
                self.log
                    .info(format_args!("favicon for {target} taken from fallback query"));
                Favicon::Present(icon.trim().to_string())
            }
            Ok(_) => Favicon::Absent,
            Err(e) => {
                self.log
                    .warn(format_args!("favicon fetch failed for {target}: {e}"));
                Favicon::FetchFailed
            }
        }
    }
}
