use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;
use crate::ports::parse_port;

/// One (host, port) endpoint. Equality and ordering define the dedup key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeTarget {
    #[serde(rename = "ip")]
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let target = Self {
            host: host.into().trim().to_string(),
            port,
        };
        target.validate()?;
        Ok(target)
    }

    /// Deserialized targets skip [`ProbeTarget::new`]; check them with this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidTarget("empty host".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::PortOutOfRange(0));
        }
        Ok(())
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`.
impl FromStr for ProbeTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidTarget(s.to_string()))?;
        ProbeTarget::new(host, parse_port(port.trim())?)
    }
}

/// Server software family inferred from the reported version string.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoreKind {
    #[default]
    Vanilla,
    Paper,
    Spigot,
    Forge,
    Fabric,
}

impl CoreKind {
    /// Checked in this order; the first case-insensitive substring hit wins.
    const PRECEDENCE: [CoreKind; 4] = [
        CoreKind::Paper,
        CoreKind::Spigot,
        CoreKind::Forge,
        CoreKind::Fabric,
    ];

    pub fn classify(version: &str) -> Self {
        let version = version.to_lowercase();
        Self::PRECEDENCE
            .into_iter()
            .find(|kind| version.contains(&kind.as_str().to_lowercase()))
            .unwrap_or(CoreKind::Vanilla)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoreKind::Vanilla => "Vanilla",
            CoreKind::Paper => "Paper",
            CoreKind::Spigot => "Spigot",
            CoreKind::Forge => "Forge",
            CoreKind::Fabric => "Fabric",
        }
    }
}

impl fmt::Display for CoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [CoreKind::Vanilla]
            .into_iter()
            .chain(Self::PRECEDENCE)
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownCoreKind(s.to_string()))
    }
}

/// Server icon state.
///
/// Persisted as the data URI, `null` when the server sent none, or `false` when
/// the fallback fetch errored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Favicon {
    Present(String),
    #[default]
    Absent,
    FetchFailed,
}

impl Favicon {
    pub fn is_present(&self) -> bool {
        matches!(self, Favicon::Present(_))
    }
}

impl Serialize for Favicon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Favicon::Present(data) => serializer.serialize_str(data),
            Favicon::Absent => serializer.serialize_none(),
            Favicon::FetchFailed => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Favicon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FaviconVisitor;

        impl<'de> Visitor<'de> for FaviconVisitor {
            type Value = Favicon;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a data URI string, null or false")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Favicon, E> {
                if v.is_empty() {
                    Ok(Favicon::Absent)
                } else {
                    Ok(Favicon::Present(v.to_string()))
                }
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Favicon, E> {
                // Older files stored a bare "has favicon" flag with no data.
                if v {
                    Ok(Favicon::Absent)
                } else {
                    Ok(Favicon::FetchFailed)
                }
            }

            fn visit_none<E: de::Error>(self) -> Result<Favicon, E> {
                Ok(Favicon::Absent)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Favicon, E> {
                Ok(Favicon::Absent)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Favicon, D::Error> {
                d.deserialize_any(FaviconVisitor)
            }
        }

        deserializer.deserialize_any(FaviconVisitor)
    }
}

/// Status of one live server, normalized from a provider record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProbeResult {
    #[serde(flatten)]
    pub target: ProbeTarget,
    pub motd: String,
    pub version: String,
    pub protocol: i32,
    pub players_online: u32,
    pub players_max: u32,
    #[serde(default)]
    pub players_sample: Vec<String>,
    /// The server sent mod-loader data, even an empty mod list.
    #[serde(default)]
    pub forge: bool,
    #[serde(default)]
    pub mods: Vec<String>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(rename = "core", default)]
    pub core_kind: CoreKind,
    #[serde(default)]
    pub favicon: Favicon,
    #[serde(rename = "ping")]
    pub ping_ms: f64,
}

/// One completed scan round as written to the history file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub time: String,
    pub ip: String,
    pub ports: String,
    pub servers: usize,
    #[serde(default)]
    pub results: Vec<ProbeResult>,
}

/// Contents of an exported results file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SavedResults {
    pub scanned_at: String,
    pub servers_found: usize,
    pub results: Vec<ProbeResult>,
}
