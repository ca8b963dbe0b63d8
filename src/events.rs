//! Event resolution from the annotation stream.
//!
//! Markers whose label starts with `"Stimulus"` become events.  The default
//! code is the trailing integer of the label (`"Stimulus/S 11"` → 11); a
//! label without one gets the 1-based rank of its label among the sorted
//! unique stimulus labels.  An explicit trigger map fully replaces the
//! default mapping and restricts the events to the mapped labels.

use tracing::debug;

use crate::errors::{Error, Result};
use crate::raw::RawRecording;

/// Label prefix that marks a stimulus annotation.
const STIMULUS_PREFIX: &str = "Stimulus";

/// One accepted trigger: sample onset and integer code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub onset_sample: usize,
    pub code: i32,
}

/// Derive the event list, optionally constrained by an explicit
/// label → code map.
pub fn resolve_events(
    raw: &RawRecording,
    triggers: Option<&[(String, i32)]>,
) -> Result<Vec<Event>> {
    let stimuli: Vec<(&str, f64)> = raw
        .annotations
        .iter()
        .filter(|a| a.description.starts_with(STIMULUS_PREFIX))
        .map(|a| (a.description.as_str(), a.onset))
        .collect();

    let events: Vec<Event> = match triggers {
        Some(map) => {
            for (label, _) in map {
                if !stimuli.iter().any(|(desc, _)| *desc == label) {
                    return Err(Error::config(format!(
                        "trigger label {label:?} not found in the recording's markers"
                    )));
                }
            }
            stimuli
                .iter()
                .filter_map(|&(desc, onset)| {
                    map.iter()
                        .find(|(label, _)| label == desc)
                        .map(|&(_, code)| Event {
                            onset_sample: (onset * raw.sfreq).round() as usize,
                            code,
                        })
                })
                .collect()
        }
        None => {
            let mut labels: Vec<&str> = stimuli.iter().map(|&(desc, _)| desc).collect();
            labels.sort_unstable();
            labels.dedup();
            stimuli
                .iter()
                .map(|&(desc, onset)| {
                    let code = trailing_integer(desc).unwrap_or_else(|| {
                        labels.iter().position(|&l| l == desc).unwrap() as i32 + 1
                    });
                    Event {
                        onset_sample: (onset * raw.sfreq).round() as usize,
                        code,
                    }
                })
                .collect()
        }
    };

    debug!(n_events = events.len(), "events resolved");
    Ok(events)
}

/// Trailing run of ASCII digits in a label, if any.
fn trailing_integer(label: &str) -> Option<i32> {
    let digits: String = label
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}
