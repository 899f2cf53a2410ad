use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::ProbeTarget;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEntry {
    #[serde(flatten)]
    pub target: ProbeTarget,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl FavoriteEntry {
    pub fn new(target: ProbeTarget) -> Self {
        Self {
            target,
            tags: BTreeSet::new(),
        }
    }
}

/// Ordered favorites list with unique targets.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "Vec<FavoriteEntry>", into = "Vec<FavoriteEntry>")]
pub struct Favorites {
    entries: Vec<FavoriteEntry>,
}

/// Outcome of importing a text list of servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    /// Lines that were not `host:port`.
    pub rejected: Vec<String>,
}

impl Favorites {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FavoriteEntry> {
        self.entries.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &ProbeTarget> {
        self.entries.iter().map(|e| &e.target)
    }

    pub fn get(&self, target: &ProbeTarget) -> Option<&FavoriteEntry> {
        self.entries.iter().find(|e| &e.target == target)
    }

    pub fn contains(&self, target: &ProbeTarget) -> bool {
        self.get(target).is_some()
    }

    /// Returns false when the target is invalid or already a favorite.
    pub fn add(&mut self, target: ProbeTarget) -> bool {
        if target.validate().is_err() || self.contains(&target) {
            return false;
        }
        self.entries.push(FavoriteEntry::new(target));
        true
    }

    pub fn remove(&mut self, target: &ProbeTarget) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.target != target);
        self.entries.len() != before
    }

    /// Tag an existing favorite. Returns false for an unknown target or a blank tag.
    pub fn add_tag(&mut self, target: &ProbeTarget, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        match self.entries.iter_mut().find(|e| &e.target == target) {
            Some(entry) => {
                entry.tags.insert(tag.to_string());
                true
            }
            None => false,
        }
    }

    /// Import `host:port` lines.
    ///
    /// - blank lines and `#` comments are ignored
    /// - malformed lines are collected in [`ImportSummary::rejected`]
    /// - already known targets are skipped
    pub fn import_lines(&mut self, s: &str) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for raw_line in s.lines() {
            let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
            if line.is_empty() {
                continue;
            }
            match line.parse::<ProbeTarget>() {
                Ok(target) => {
                    if self.add(target) {
                        summary.added += 1;
                    }
                }
                Err(_) => summary.rejected.push(line.to_string()),
            }
        }
        summary
    }
}

/// Duplicates collapse onto the first position; the last occurrence's tags win.
/// Entries with an empty host or port 0 are dropped with a warning.
impl From<Vec<FavoriteEntry>> for Favorites {
    fn from(list: Vec<FavoriteEntry>) -> Self {
        let mut entries: Vec<FavoriteEntry> = Vec::with_capacity(list.len());
        for entry in list {
            if let Err(e) = entry.target.validate() {
                log::warn!("dropping favorite {:?}: {e}", entry.target.to_string());
                continue;
            }
            match entries.iter_mut().find(|e| e.target == entry.target) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Self { entries }
    }
}

impl From<Favorites> for Vec<FavoriteEntry> {
    fn from(favorites: Favorites) -> Self {
        favorites.entries
    }
}
