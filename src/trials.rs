//! Single-trial table: behavioral metadata fused with component amplitudes.
//!
//! The behavioral log supplies one row per retained trial, in epoch order
//! (an external contract of the log reader).  Fusion prepends the
//! participant id, then each configured response component adds one
//! mean-amplitude column.  Bad epochs are flagged with `NA`, never dropped,
//! so the row count always equals the epoch count.

use crate::config::Component;
use crate::epochs::Epochs;
use crate::errors::{Error, Result};
use crate::table::{DataTable, Value};

/// Attach the behavioral log to the epochs as their metadata table.
///
/// The log must already be filtered to the retained trials; a row count
/// differing from the epoch count means the skip filters and the recording
/// disagree, which is a configuration error.
pub fn fuse_metadata(
    mut log: DataTable,
    participant_id: &str,
    epochs: &Epochs,
) -> Result<DataTable> {
    if log.n_rows() != epochs.n_epochs() {
        return Err(Error::config(format!(
            "behavioral log has {} rows for {} epochs",
            log.n_rows(),
            epochs.n_epochs()
        )));
    }
    let ids = vec![Value::Str(participant_id.to_string()); log.n_rows()];
    log.insert_column_front("participant_id", ids)?;
    Ok(log)
}

/// Append one mean-amplitude column per component to the trial table.
///
/// The amplitude is the mean over the component's time window and region
/// of interest; epochs listed in `bad_epoch_ixs` get `NA` so downstream
/// joins keep their row correspondence.
pub fn compute_single_trials(
    epochs: &Epochs,
    components: &[Component],
    bad_epoch_ixs: &[usize],
    trials: &mut DataTable,
) -> Result<()> {
    for component in components {
        let roi: Vec<usize> = component
            .roi
            .iter()
            .map(|name| {
                epochs.channel_index(name).ok_or_else(|| {
                    Error::config(format!(
                        "component {:?} names unknown channel {name:?}",
                        component.name
                    ))
                })
            })
            .collect::<Result<_>>()?;
        if roi.is_empty() {
            return Err(Error::config(format!(
                "component {:?} has an empty region of interest",
                component.name
            )));
        }

        let window: Vec<usize> = epochs
            .times()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= component.tmin && t <= component.tmax)
            .map(|(i, _)| i)
            .collect();
        if window.is_empty() {
            return Err(Error::config(format!(
                "component {:?} window [{}, {}] contains no samples",
                component.name, component.tmin, component.tmax
            )));
        }

        let values: Vec<Value> = (0..epochs.n_epochs())
            .map(|e| {
                if bad_epoch_ixs.contains(&e) {
                    return Value::Missing;
                }
                let mut sum = 0.0;
                for &c in &roi {
                    for &t in &window {
                        sum += epochs.data[[e, c, t]];
                    }
                }
                Value::Float(sum / (roi.len() * window.len()) as f64)
            })
            .collect();
        trials.set_column(&component.name, values)?;
    }
    Ok(())
}
