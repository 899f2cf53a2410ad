//! JSON persistence for favorites, scan history and exported results.
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::macros::format_description;
use time::{format_description::well_known, OffsetDateTime};

use crate::favorites::Favorites;
use crate::types::{HistoryEntry, ProbeResult, SavedResults};

pub const FAVORITES_FILE: &str = "favorites.json";
pub const HISTORY_FILE: &str = "history.json";
pub const RESULTS_FILE: &str = "results.json";

/// Where a [`crate::rounds::ScanRounds`] keeps its state between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub favorites: PathBuf,
    pub history: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            favorites: dir.as_ref().join(FAVORITES_FILE),
            history: dir.as_ref().join(HISTORY_FILE),
        }
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

/// A missing file is an empty favorites list.
pub fn load_favorites(path: impl AsRef<Path>) -> Result<Favorites> {
    Ok(read_json_or_default(path.as_ref())?.unwrap_or_default())
}

pub fn save_favorites(path: impl AsRef<Path>, favorites: &Favorites) -> Result<()> {
    write_json(path.as_ref(), favorites)
}

/// A missing file is an empty history.
pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<HistoryEntry>> {
    Ok(read_json_or_default(path.as_ref())?.unwrap_or_default())
}

pub fn save_history(path: impl AsRef<Path>, history: &[HistoryEntry]) -> Result<()> {
    write_json(path.as_ref(), history)
}

/// Export results with a UTC scan timestamp.
pub fn save_results(path: impl AsRef<Path>, results: &[ProbeResult]) -> Result<SavedResults> {
    let saved = SavedResults {
        scanned_at: now_rfc3339(),
        servers_found: results.len(),
        results: results.to_vec(),
    };
    write_json(path.as_ref(), &saved)?;
    Ok(saved)
}

pub fn load_results(path: impl AsRef<Path>) -> Result<SavedResults> {
    let path = path.as_ref();
    read_json_or_default(path)?
        .with_context(|| format!("results file not found: {}", path.display()))
}

/// Build the history record for a finished sweep.
pub fn history_entry(ip: &str, ports: &str, results: &[ProbeResult]) -> HistoryEntry {
    HistoryEntry {
        time: now_history_time(),
        ip: ip.to_string(),
        ports: ports.to_string(),
        servers: results.len(),
        results: results.to_vec(),
    }
}

fn read_json_or_default<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    fs::rename(&tmp, path).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

fn now_history_time() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| String::from("1970-01-01 00:00:00"))
}
