#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{Level, Log, Metadata, Record};

use mc_scan_rs::provider::{StatusProvider, StatusRecord};
use mc_scan_rs::ProbeError;

/// How the fake server at a port answers.
#[derive(Clone, Debug)]
pub enum Reply {
    Online { version: String, players: u32, ping: f64 },
    Refused,
    /// Never answers; the probe timeout fires.
    Hang,
    Malformed,
    Panic,
}

/// In-memory stand-in for a status provider, keyed by port.
///
/// Ports without a scripted reply refuse the connection.
#[derive(Default)]
pub struct FakeProvider {
    replies: Mutex<HashMap<(String, u16), Reply>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    max_live_tasks: AtomicUsize,
    queries: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reply(self, host: &str, port: u16, reply: Reply) -> Self {
        self.set_reply(host, port, reply);
        self
    }

    pub fn set_reply(&self, host: &str, port: u16, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert((host.to_string(), port), reply);
    }

    pub fn online(self, host: &str, port: u16, version: &str, players: u32, ping: f64) -> Self {
        self.reply(
            host,
            port,
            Reply::Online {
                version: version.to_string(),
                players,
                ping,
            },
        )
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Most tokio tasks alive at once, sampled at every query.
    pub fn max_live_tasks(&self) -> usize {
        self.max_live_tasks.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusProvider for FakeProvider {
    async fn query(&self, host: &str, port: u16, _timeout: Duration) -> Result<StatusRecord, ProbeError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let live = tokio::runtime::Handle::current().metrics().num_alive_tasks();
        self.max_live_tasks.fetch_max(live, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&(host.to_string(), port))
            .cloned()
            .unwrap_or(Reply::Refused);
        match reply {
            Reply::Online {
                version,
                players,
                ping,
            } => {
                let mut record = StatusRecord::new(format!("{host}:{port}").as_str(), version);
                record.protocol = 763;
                record.players_online = players;
                record.players_max = 20;
                record.latency_ms = ping;
                record.icon = Some("data:image/png;base64,AAAA".to_string());
                Ok(record)
            }
            Reply::Refused => Err(ProbeError::Refused),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Reply::Malformed => Err(ProbeError::Protocol("unexpected packet".into())),
            Reply::Panic => panic!("provider blew up on {host}:{port}"),
        }
    }
}

/// Records every log line it receives.
#[derive(Default)]
pub struct CaptureLog {
    lines: Mutex<Vec<(Level, String)>>,
}

impl CaptureLog {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Log for CaptureLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
