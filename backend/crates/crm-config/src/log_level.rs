use crate::DEFAULT_LOG_LEVEL;

use std::str::FromStr;

use log::LevelFilter;
use serde::{Deserialize, Deserializer};

/// Log verbosity as written in `config.toml` or `CRM_LOG_LEVEL`.
///
/// Parsing is lenient on purpose: case is ignored and an unrecognized
/// value falls back to the default instead of failing startup over a typo.
#[derive(Debug, Clone, Copy)]
pub struct LogLevel(pub LevelFilter);

const NAMED_LEVELS: [(&str, LevelFilter); 6] = [
    ("off", LevelFilter::Off),
    ("error", LevelFilter::Error),
    ("warn", LevelFilter::Warn),
    ("info", LevelFilter::Info),
    ("debug", LevelFilter::Debug),
    ("trace", LevelFilter::Trace),
];

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let filter = NAMED_LEVELS
            .iter()
            .find(|(name, _)| raw.eq_ignore_ascii_case(name))
            .map(|(_, filter)| *filter)
            .unwrap_or(DEFAULT_LOG_LEVEL);
        Ok(LogLevel(filter))
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer).unwrap_or_default();
        Ok(raw.parse().unwrap_or(LogLevel(DEFAULT_LOG_LEVEL)))
    }
}
