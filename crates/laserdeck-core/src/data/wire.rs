//! Wire-format handling for state documents
//!
//! The canonical document nests job and hardware fields under `job` and
//! `components`. The first controller firmware pushed a flat document instead;
//! such documents are migrated here so nothing past the parse boundary ever
//! sees the old shape.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use super::StateUpdate;
use crate::error::PayloadError;

/// Top-level keys that identify the legacy flat document shape
pub const LEGACY_FLAT_KEYS: &[&str] = &[
    "filename",
    "currentline",
    "totallines",
    "printingtime",
    "passesperline",
    "exposureperline",
    "laserpower",
    "singlefacet",
    "rotating",
    "laser",
    "diodetest",
];

/// Legacy key -> canonical key inside `job`
const LEGACY_JOB_KEYS: &[(&str, &str)] = &[
    ("filename", "filename"),
    ("currentline", "currentline"),
    ("totallines", "totallines"),
    ("printingtime", "printingtime"),
    ("passesperline", "exposureperline"),
    ("exposureperline", "exposureperline"),
    ("laserpower", "laserpower"),
    ("singlefacet", "singlefacet"),
];

const LEGACY_COMPONENT_KEYS: &[&str] = &["rotating", "laser", "diodetest"];

const UNAUTHORIZED_KEY: &str = "notauthorized";

#[derive(Deserialize)]
#[serde(untagged)]
enum UintRepr {
    Number(u64),
    Text(String),
}

/// Accepts an unsigned integer or a string holding one.
///
/// Form fields are forwarded by the controller as strings, so both appear.
pub(super) fn lenient_uint<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
    T::Error: fmt::Display,
{
    let raw = match UintRepr::deserialize(deserializer)? {
        UintRepr::Number(value) => value,
        UintRepr::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| de::Error::custom(format!("expected unsigned integer, got {text:?}: {e}")))?,
    };
    T::try_from(raw).map_err(de::Error::custom)
}

impl StateUpdate {
    /// Parse a pushed or echoed state document
    pub fn from_json(payload: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(payload).map_err(|e| PayloadError::NotJson {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Interpret an already-decoded JSON document
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut object) = value else {
            return Err(PayloadError::NotAnObject);
        };

        if object.contains_key(UNAUTHORIZED_KEY) {
            return Err(PayloadError::Unauthorized);
        }

        if is_legacy_flat(&object) {
            tracing::debug!("Migrating legacy flat state document");
            object = migrate_flat(object);
        }

        let mut update: StateUpdate =
            serde_json::from_value(Value::Object(object)).map_err(|e| PayloadError::Invalid {
                reason: e.to_string(),
            })?;

        if update.is_empty() {
            return Err(PayloadError::NoKnownFields);
        }

        if let Some(job) = update.job.as_mut() {
            let (current, total) = (job.current_line, job.total_lines);
            if job.clamp_progress() {
                tracing::warn!(
                    "Job reports line {} of {}, clamping to total",
                    current,
                    total
                );
            }
        }

        Ok(update)
    }
}

fn is_legacy_flat(object: &Map<String, Value>) -> bool {
    !object.contains_key("job")
        && !object.contains_key("components")
        && LEGACY_FLAT_KEYS.iter().any(|key| object.contains_key(*key))
}

fn migrate_flat(mut object: Map<String, Value>) -> Map<String, Value> {
    let mut job = Map::new();
    for (legacy, canonical) in LEGACY_JOB_KEYS {
        if let Some(value) = object.remove(*legacy) {
            job.insert((*canonical).to_string(), value);
        }
    }

    let mut components = Map::new();
    for key in LEGACY_COMPONENT_KEYS {
        if let Some(value) = object.remove(*key) {
            components.insert((*key).to_string(), value);
        }
    }

    if !job.is_empty() {
        object.insert("job".to_string(), Value::Object(job));
    }
    if !components.is_empty() {
        object.insert("components".to_string(), Value::Object(components));
    }
    object
}
