use std::collections::BTreeMap;

use crate::types::{CoreKind, ProbeResult, ProbeTarget};

/// Results keyed by target; at most one entry per (host, port).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResultSet {
    entries: BTreeMap<ProbeTarget, ProbeResult>,
}

impl AggregatedResultSet {
    /// Collect results; a later entry for the same target replaces an earlier one.
    pub fn from_results(results: impl IntoIterator<Item = ProbeResult>) -> Self {
        let mut set = Self::default();
        set.absorb(results);
        set
    }

    fn absorb(&mut self, results: impl IntoIterator<Item = ProbeResult>) {
        for result in results {
            self.entries.insert(result.target.clone(), result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, target: &ProbeTarget) -> Option<&ProbeResult> {
        self.entries.get(target)
    }

    pub fn contains(&self, target: &ProbeTarget) -> bool {
        self.entries.contains_key(target)
    }

    /// Entries in target order.
    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.entries.values()
    }

}

/// Merge two scan outputs. On a shared target the `secondary` result wins, as it
/// was produced after the primary sweep.
pub fn merge(
    primary: impl IntoIterator<Item = ProbeResult>,
    secondary: impl IntoIterator<Item = ProbeResult>,
) -> AggregatedResultSet {
    let mut set = AggregatedResultSet::from_results(primary);
    set.absorb(secondary);
    set
}

/// Read-only selection over an aggregated snapshot.
///
/// Substring filters compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub with_players: bool,
    pub core: Option<CoreKind>,
    pub version: Option<String>,
    pub motd: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, result: &ProbeResult) -> bool {
        if self.with_players && result.players_online == 0 {
            return false;
        }
        if let Some(core) = self.core {
            if result.core_kind != core {
                return false;
            }
        }
        if !contains_ci(&result.version, self.version.as_deref()) {
            return false;
        }
        contains_ci(&result.motd, self.motd.as_deref())
    }

    pub fn apply<'a>(&self, set: &'a AggregatedResultSet) -> Vec<&'a ProbeResult> {
        set.iter().filter(|r| self.matches(r)).collect()
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    None,
    PingAscending,
    PlayersDescending,
}

impl SortOrder {
    /// Stable sort of a view; entries with equal keys keep their relative order.
    pub fn sort(&self, view: &mut [&ProbeResult]) {
        match self {
            SortOrder::None => {}
            SortOrder::PingAscending => view.sort_by(|a, b| a.ping_ms.total_cmp(&b.ping_ms)),
            SortOrder::PlayersDescending => {
                view.sort_by(|a, b| b.players_online.cmp(&a.players_online))
            }
        }
    }
}

/// Filter then sort in one step.
pub fn select<'a>(
    set: &'a AggregatedResultSet,
    filter: &ResultFilter,
    order: SortOrder,
) -> Vec<&'a ProbeResult> {
    let mut view = filter.apply(set);
    order.sort(&mut view);
    view
}
