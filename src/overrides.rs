//! Per-participant option broadcasting.
//!
//! A batch caller hands every pipeline option either as one value for all
//! participants, as one value per participant, or as a participant-id map.
//! [`Override`] makes that shape explicit as a tagged variant and resolves
//! it once, before orchestration begins, into a uniform per-participant
//! vector.  Mismatched lengths and unknown ids are configuration errors.

use std::path::Path;

use serde_json::Value;

use crate::errors::{Error, Result};

/// Participant identifier derived from a raw-data filename: the stem before
/// the first `.` (e.g. `.../S01.vhdr` → `"S01"`).
pub fn participant_id(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .split('.')
        .next()
        .unwrap_or("")
        .to_string()
}

/// One pipeline option in the shape the batch caller provided it.
#[derive(Debug, Clone, PartialEq)]
pub enum Override<T> {
    /// The same value for every participant.
    Scalar(T),
    /// One value per participant, in participant order.
    PerParticipant(Vec<T>),
    /// Values keyed by participant id; missing ids get `T::default()`.
    PerParticipantMap(Vec<(String, T)>),
}

impl<T: Clone + Default> Override<T> {
    /// Resolve into exactly one value per participant id.
    ///
    /// Errors:
    /// - `PerParticipant` list whose length differs from `ids.len()`.
    /// - `PerParticipantMap` containing an id not present in `ids`.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<T>> {
        match self {
            Override::Scalar(v) => Ok(vec![v.clone(); ids.len()]),
            Override::PerParticipant(values) => {
                if values.len() != ids.len() {
                    return Err(Error::config(format!(
                        "per-participant override has {} values for {} participants",
                        values.len(),
                        ids.len()
                    )));
                }
                Ok(values.clone())
            }
            Override::PerParticipantMap(map) => {
                for (id, _) in map {
                    if !ids.iter().any(|known| known == id) {
                        return Err(Error::config(format!(
                            "participant id {id:?} is not among the input files"
                        )));
                    }
                }
                Ok(ids
                    .iter()
                    .map(|id| {
                        map.iter()
                            .find(|(k, _)| k == id)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    })
                    .collect())
            }
        }
    }
}

/// Whether an untyped JSON value is a list of lists.
///
/// Non-arrays and flat arrays (including the empty array) are not nested.
pub fn is_nested(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| v.is_array()),
        _ => false,
    }
}

/// Classify an untyped JSON override into its tagged shape.
///
/// Objects become maps, nested arrays become per-participant lists, and
/// everything else (scalars and flat arrays) broadcasts to all
/// participants.  This mirrors how batch front-ends pass options through
/// JSON config files.
pub fn classify(value: &Value) -> Override<Value> {
    match value {
        Value::Object(map) => Override::PerParticipantMap(
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ),
        v if is_nested(v) => match v {
            Value::Array(items) => Override::PerParticipant(items.clone()),
            _ => unreachable!("is_nested only matches arrays"),
        },
        v => Override::Scalar(v.clone()),
    }
}
