use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::aggregate::{merge, AggregatedResultSet};
use crate::error::{ConfigError, ScanError};
use crate::favorites::Favorites;
use crate::logging::ScanLog;
use crate::provider::StatusProvider;
use crate::scanner::{ProgressSender, ProgressTracker, ScanReport, ScanRequest, ScanSession};
use crate::schedule::{RescanInterval, RescanScheduler};
use crate::store::{self, StorePaths};
use crate::types::{HistoryEntry, ProbeResult};

/// State shared across rounds. Only [`ScanRounds`] mutates it.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    pub favorites: Favorites,
    pub history: Vec<HistoryEntry>,
    /// Aggregated output of the most recent round.
    pub latest: AggregatedResultSet,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub main: ScanReport,
    pub favorites: Vec<ProbeResult>,
    pub aggregated: AggregatedResultSet,
}

/// Runs scan rounds: the requested range, then every favorite, merged into one set.
///
/// A round holds the state lock from start to finish, so rounds triggered
/// manually and by the scheduler never overlap.
pub struct ScanRounds {
    session: ScanSession,
    state: Mutex<RoundState>,
    store: Option<StorePaths>,
    log: ScanLog,
}

impl ScanRounds {
    pub fn new(provider: Arc<dyn StatusProvider>, state: RoundState, log: ScanLog) -> Self {
        Self {
            session: ScanSession::new(provider, log.clone()),
            state: Mutex::new(state),
            store: None,
            log: log.with_target("mc_scan::rounds"),
        }
    }

    /// Load favorites and history from `paths` and write them back after changes.
    pub fn open(provider: Arc<dyn StatusProvider>, paths: StorePaths, log: ScanLog) -> Result<Self> {
        let state = RoundState {
            favorites: store::load_favorites(&paths.favorites)?,
            history: store::load_history(&paths.history)?,
            latest: AggregatedResultSet::default(),
        };
        let mut rounds = Self::new(provider, state, log);
        rounds.store = Some(paths);
        Ok(rounds)
    }

    pub async fn snapshot(&self) -> RoundState {
        self.state.lock().await.clone()
    }

    pub async fn latest(&self) -> AggregatedResultSet {
        self.state.lock().await.latest.clone()
    }

    /// Edit favorites between rounds; persisted when a store is configured.
    pub async fn update_favorites<R>(&self, edit: impl FnOnce(&mut Favorites) -> R) -> R {
        let mut state = self.state.lock().await;
        let out = edit(&mut state.favorites);
        if let Some(paths) = &self.store {
            if let Err(e) = store::save_favorites(&paths.favorites, &state.favorites) {
                self.log.error(format_args!("failed to save favorites: {e:#}"));
            }
        }
        out
    }

    /// Scan the requested range, then the favorites, and fold both into one set.
    ///
    /// Progress restarts at 0 for the favorites sweep.
    pub async fn run_round(
        &self,
        request: &ScanRequest,
        progress: Option<ProgressSender>,
    ) -> Result<RoundReport, ScanError> {
        request.validate()?;
        let mut state = self.state.lock().await;

        let main = self.session.run(request, progress.clone()).await?;
        let favorites = self
            .scan_favorites(&state.favorites, request.timeout, request.retries, progress)
            .await?;
        let aggregated = merge(main.entries.clone(), favorites.clone());

        state
            .history
            .push(store::history_entry(&request.host, &request.range_label(), &main.entries));
        if let Some(paths) = &self.store {
            if let Err(e) = store::save_history(&paths.history, &state.history) {
                self.log.error(format_args!("failed to save history: {e:#}"));
            }
        }
        state.latest = aggregated.clone();

        self.log.info(format_args!(
            "round finished: {} in range, {} favorites online, {} unique",
            main.found,
            favorites.len(),
            aggregated.len()
        ));
        Ok(RoundReport {
            main,
            favorites,
            aggregated,
        })
    }

    /// Check only the favorites.
    pub async fn check_favorites(
        &self,
        timeout: Duration,
        retries: u32,
        progress: Option<ProgressSender>,
    ) -> Result<Vec<ProbeResult>, ScanError> {
        let state = self.state.lock().await;
        self.scan_favorites(&state.favorites, timeout, retries, progress)
            .await
    }

    /// Repeat the sweep recorded in history entry `index`.
    pub async fn rescan_history(
        &self,
        index: usize,
        progress: Option<ProgressSender>,
    ) -> Result<RoundReport, ScanError> {
        let request = {
            let state = self.state.lock().await;
            let entry = state
                .history
                .get(index)
                .ok_or(ConfigError::UnknownHistoryEntry(index))?;
            ScanRequest::from_range_str(entry.ip.clone(), &entry.ports)?
        };
        self.log.info(format_args!(
            "rescanning {}:{} from history",
            request.host,
            request.range_label()
        ));
        self.run_round(&request, progress).await
    }

    /// Build an idle scheduler that repeats `request` as a full round.
    ///
    /// The request is validated here, so a scheduler never holds one that
    /// every tick would reject.
    pub fn schedule(
        self: Arc<Self>,
        request: ScanRequest,
        interval: RescanInterval,
    ) -> Result<RescanScheduler, ConfigError> {
        request.validate()?;
        let log = self.log.clone();
        let rounds = self;
        Ok(RescanScheduler::spawn(
            move || {
                let rounds = Arc::clone(&rounds);
                let request = request.clone();
                async move {
                    if let Err(e) = rounds.run_round(&request, None).await {
                        rounds.log.error(format_args!(
                            "scheduled rescan of {}:{} failed: {e}",
                            request.host,
                            request.range_label()
                        ));
                    }
                }
            },
            interval,
            log,
        ))
    }

    async fn scan_favorites(
        &self,
        favorites: &Favorites,
        timeout: Duration,
        retries: u32,
        progress: Option<ProgressSender>,
    ) -> Result<Vec<ProbeResult>, ScanError> {
        if favorites.is_empty() {
            return Ok(Vec::new());
        }
        let mut tracker = ProgressTracker::start(favorites.len() as u64, progress);
        let mut found = Vec::new();
        for target in favorites.targets() {
            let request = ScanRequest::single(target)
                .with_timeout(timeout)
                .with_retries(retries);
            let report = self.session.run(&request, None).await?;
            found.extend(report.entries);
            tracker.advance();
        }
        self.log.info(format_args!(
            "favorites check finished: {}/{} online",
            found.len(),
            favorites.len()
        ));
        Ok(found)
    }
}
