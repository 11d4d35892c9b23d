pub mod funnel_repository;
pub mod opportunity_repository;
pub mod stage_repository;
pub mod webhook_config_repository;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{DbError, Result};

// Row decoding helpers shared by the repositories. Ids are stored as TEXT,
// timestamps as epoch seconds, lists and maps as JSON text.

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

pub(crate) fn parse_timestamp(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| DbError::decode(format!("timestamp {seconds} out of range")))
}

pub(crate) fn parse_optional_timestamp(seconds: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    seconds.map(parse_timestamp).transpose()
}

pub(crate) fn parse_string_list(json: &str) -> Result<Vec<String>> {
    serde_json::from_str(json).map_err(|e| DbError::decode(format!("invalid string list: {e}")))
}

pub(crate) fn parse_string_map(json: &str) -> Result<HashMap<String, String>> {
    serde_json::from_str(json).map_err(|e| DbError::decode(format!("invalid field map: {e}")))
}

pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn encode_string_map(values: &HashMap<String, String>) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "{}".to_string())
}
