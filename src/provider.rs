//! Boundary to the status-query protocol.
//!
//! The crate does not speak the server protocol itself. Implementors of
//! [`StatusProvider`] hand back a [`StatusRecord`], which is normalized into a
//! [`ProbeResult`] here so nothing downstream has to second-guess its shape.
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProbeError;
use crate::types::{CoreKind, Favicon, ProbeResult, ProbeTarget};

/// Queries the status of one server.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn query(&self, host: &str, port: u16, timeout: Duration)
        -> Result<StatusRecord, ProbeError>;

    /// Secondary path used when the primary response carried no icon.
    async fn query_favicon(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> Result<Option<String>, ProbeError> {
        Ok(None)
    }
}

/// Server description as sent on the wire: plain text or a chat component tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Description {
    Text(String),
    Component(Value),
}

impl Description {
    /// Render to a single string, keeping formatting as `§` codes.
    pub fn to_legacy_string(&self) -> String {
        match self {
            Description::Text(s) => s.clone(),
            Description::Component(value) => {
                let mut out = String::new();
                render_component(value, &mut out);
                out
            }
        }
    }
}

impl From<&str> for Description {
    fn from(s: &str) -> Self {
        Description::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModInfo {
    pub name: String,
    pub marker: String,
}

/// Raw status reply as reported by a [`StatusProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub description: Description,
    pub version_name: String,
    pub protocol: i32,
    pub players_online: u32,
    pub players_max: u32,
    pub players_sample: Option<Vec<String>>,
    /// Present only when the server identifies as a modded variant.
    pub mods: Option<Vec<ModInfo>>,
    pub plugins: Option<Vec<String>>,
    pub icon: Option<String>,
    pub latency_ms: f64,
}

impl StatusRecord {
    pub fn new(description: impl Into<Description>, version_name: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            version_name: version_name.into(),
            protocol: 0,
            players_online: 0,
            players_max: 0,
            players_sample: None,
            mods: None,
            plugins: None,
            icon: None,
            latency_ms: 0.0,
        }
    }

    /// The icon from the primary response, if it carried a usable one.
    pub fn favicon(&self) -> Option<&str> {
        self.icon.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

impl ProbeResult {
    /// Build a result from a provider record. `favicon` is resolved by the caller.
    pub fn from_status(target: ProbeTarget, record: StatusRecord, favicon: Favicon) -> Self {
        let version = record.version_name.trim().to_string();
        let core_kind = CoreKind::classify(&version);
        let ping_ms = if record.latency_ms.is_finite() {
            record.latency_ms.max(0.0)
        } else {
            0.0
        };
        Self {
            target,
            motd: record.description.to_legacy_string(),
            version,
            protocol: record.protocol,
            players_online: record.players_online,
            players_max: record.players_max,
            players_sample: clean_names(record.players_sample.unwrap_or_default()),
            forge: record.mods.is_some(),
            mods: record
                .mods
                .unwrap_or_default()
                .into_iter()
                .map(|m| format!("{} {}", m.name, m.marker).trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            plugins: clean_names(record.plugins.unwrap_or_default()),
            core_kind,
            favicon,
            ping_ms,
        }
    }
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn color_code(name: &str) -> Option<char> {
    let code = match name {
        "black" => '0',
        "dark_blue" => '1',
        "dark_green" => '2',
        "dark_aqua" => '3',
        "dark_red" => '4',
        "dark_purple" => '5',
        "gold" => '6',
        "gray" => '7',
        "dark_gray" => '8',
        "blue" => '9',
        "green" => 'a',
        "aqua" => 'b',
        "red" => 'c',
        "light_purple" => 'd',
        "yellow" => 'e',
        "white" => 'f',
        _ => return None,
    };
    Some(code)
}

const STYLE_CODES: [(&str, char); 5] = [
    ("obfuscated", 'k'),
    ("bold", 'l'),
    ("strikethrough", 'm'),
    ("underlined", 'n'),
    ("italic", 'o'),
];

fn render_component(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|p| render_component(p, out)),
        Value::Object(map) => {
            if let Some(code) = map.get("color").and_then(Value::as_str).and_then(color_code) {
                out.push('§');
                out.push(code);
            }
            for (key, code) in STYLE_CODES {
                if map.get(key).and_then(Value::as_bool) == Some(true) {
                    out.push('§');
                    out.push(code);
                }
            }
            if let Some(text) = map.get("text") {
                render_component(text, out);
            }
            if let Some(extra) = map.get("extra") {
                render_component(extra, out);
            }
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        _ => {}
    }
}
