use crate::error::ConfigError;

/// Parse a single port number in 1..=65535.
pub fn parse_port(s: &str) -> Result<u16, ConfigError> {
    let val: u32 = s
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidPort(s.to_string()))?;
    if val == 0 || val > 65535 {
        return Err(ConfigError::PortOutOfRange(val));
    }
    Ok(val as u16)
}

/// Parse an inclusive port range.
///
/// Supported forms:
/// - inclusive range: `25565-25600`
/// - single port: `25565` (start == end)
///
/// The range must satisfy `1 <= start <= end <= 65535`.
pub fn parse_port_range(s: &str) -> Result<(u16, u16), ConfigError> {
    let s = s.trim();
    if let Some((a, b)) = s.split_once('-') {
        let start = parse_port(a)?;
        let end = parse_port(b)?;
        if start > end {
            return Err(ConfigError::InvertedRange { start, end });
        }
        return Ok((start, end));
    }
    let p = parse_port(s)?;
    Ok((p, p))
}

/// Render a range the way history entries store it.
pub fn format_port_range(start: u16, end: u16) -> String {
    format!("{start}-{end}")
}
