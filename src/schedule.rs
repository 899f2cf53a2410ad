use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::ConfigError;
use crate::logging::ScanLog;

pub const DEFAULT_RESCAN_MINUTES: f64 = 5.0;
pub const MIN_RESCAN_MINUTES: f64 = 1.0;
pub const MAX_RESCAN_MINUTES: f64 = 1440.0;

/// Delay between the end of one rescan and the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescanInterval(Duration);

impl RescanInterval {
    pub fn from_minutes(minutes: f64) -> Result<Self, ConfigError> {
        if !(MIN_RESCAN_MINUTES..=MAX_RESCAN_MINUTES).contains(&minutes) {
            return Err(ConfigError::InvalidInterval(minutes.to_string()));
        }
        Ok(Self(Duration::from_secs_f64(minutes * 60.0)))
    }

    /// Parse user input in minutes; fractions are allowed.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let minutes: f64 = input
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInterval(input.to_string()))?;
        Self::from_minutes(minutes)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u128 {
        self.0.as_millis()
    }
}

impl Default for RescanInterval {
    fn default() -> Self {
        Self(Duration::from_secs_f64(DEFAULT_RESCAN_MINUTES * 60.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
}

#[derive(Debug, Clone, Copy)]
struct Control {
    armed: bool,
    interval: Duration,
}

/// Re-runs a scan at a fixed interval while armed.
///
/// The wait starts once the previous run has completed. Disabling drops the
/// pending run but never interrupts one in progress, and a new interval is only
/// picked up when the next wait begins.
pub struct RescanScheduler {
    control: watch::Sender<Control>,
    task: JoinHandle<()>,
    stop: DropGuard,
    log: ScanLog,
}

impl RescanScheduler {
    /// Start the control loop in the Idle state.
    pub fn spawn<F, Fut>(trigger: F, interval: RescanInterval, log: ScanLog) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let log = log.with_target("mc_scan::schedule");
        let (control, rx) = watch::channel(Control {
            armed: false,
            interval: interval.as_duration(),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(control_loop(trigger, rx, cancel.clone(), log.clone()));
        Self {
            control,
            task,
            stop: cancel.drop_guard(),
            log,
        }
    }

    pub fn enable(&self) {
        self.control.send_modify(|c| c.armed = true);
        self.log.info(format_args!(
            "automatic rescan enabled, every {:?}",
            self.interval().as_duration()
        ));
    }

    pub fn disable(&self) {
        self.control.send_modify(|c| c.armed = false);
        self.log.info(format_args!("automatic rescan disabled"));
    }

    pub fn state(&self) -> SchedulerState {
        if self.control.borrow().armed {
            SchedulerState::Armed
        } else {
            SchedulerState::Idle
        }
    }

    pub fn interval(&self) -> RescanInterval {
        RescanInterval(self.control.borrow().interval)
    }

    /// Apply an interval typed in minutes.
    ///
    /// Invalid input is rejected and the interval reverts to the default.
    pub fn set_interval(&self, input: &str) -> Result<RescanInterval, ConfigError> {
        let parsed = RescanInterval::parse(input);
        let interval = match &parsed {
            Ok(interval) => {
                self.log
                    .info(format_args!("rescan interval set to {} minutes", input.trim()));
                *interval
            }
            Err(e) => {
                self.log.error(format_args!(
                    "{e}; falling back to {DEFAULT_RESCAN_MINUTES} minutes"
                ));
                RescanInterval::default()
            }
        };
        self.control
            .send_modify(|c| c.interval = interval.as_duration());
        parsed
    }

    /// Stop the control loop, letting a rescan already in progress finish.
    pub async fn shutdown(self) {
        let Self { task, stop, .. } = self;
        drop(stop);
        let _ = task.await;
    }
}

async fn control_loop<F, Fut>(
    mut trigger: F,
    mut control: watch::Receiver<Control>,
    cancel: CancellationToken,
    log: ScanLog,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let interval = loop {
            let c = *control.borrow_and_update();
            if c.armed {
                break c.interval;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = control.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        };

        log.debug(format_args!("next rescan in {interval:?}"));
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = disarmed(&mut control) => {
                log.debug(format_args!("pending rescan dropped"));
                continue;
            }
            _ = time::sleep(interval) => {}
        }
        if !control.borrow().armed {
            continue;
        }

        log.info(format_args!("starting scheduled rescan"));
        trigger().await;
    }
}

/// Resolves once the scheduler is switched to Idle.
async fn disarmed(control: &mut watch::Receiver<Control>) {
    loop {
        if control.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if !control.borrow_and_update().armed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_bounds() {
        assert!(RescanInterval::parse("0").is_err());
        assert!(RescanInterval::parse("2000").is_err());
        assert!(RescanInterval::parse("five").is_err());
        assert_eq!(RescanInterval::parse("1").unwrap().as_millis(), 60_000);
        assert_eq!(RescanInterval::parse("1440").unwrap().as_millis(), 86_400_000);
        assert_eq!(RescanInterval::parse("2.5").unwrap().as_millis(), 150_000);
        assert_eq!(RescanInterval::default().as_millis(), 300_000);
    }

    #[tokio::test]
    async fn rejected_interval_reverts_to_default() {
        let scheduler = RescanScheduler::spawn(
            || async {},
            RescanInterval::from_minutes(10.0).unwrap(),
            ScanLog::global(),
        );
        assert_eq!(scheduler.interval().as_millis(), 600_000);

        assert_eq!(
            scheduler.set_interval("0"),
            Err(ConfigError::InvalidInterval("0".into()))
        );
        assert_eq!(scheduler.interval().as_millis(), 300_000);

        scheduler.set_interval("30").unwrap();
        assert!(scheduler.set_interval("2000").is_err());
        assert_eq!(scheduler.interval().as_millis(), 300_000);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.enable();
        assert_eq!(scheduler.state(), SchedulerState::Armed);
        scheduler.disable();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.shutdown().await;
    }
}
