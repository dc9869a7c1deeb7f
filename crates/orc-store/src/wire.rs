//! Snake-case string <-> enum conversion for columns stored as `text`.
//!
//! Every wire enum in `orc-schemas` already derives `serde` with
//! `rename_all = "snake_case"`; round-tripping through `serde_json::Value`
//! reuses that single source of truth instead of hand-writing a second
//! `match` per enum.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

pub fn to_text<T: Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value).context("wire serialize failed")?;
    v.as_str()
        .map(str::to_owned)
        .context("wire value is not a string")
}

pub fn from_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(text.to_owned()))
        .with_context(|| format!("wire deserialize failed for '{text}'"))
}
