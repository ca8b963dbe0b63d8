//! Condition-averaged evoked responses.
//!
//! Groups the non-bad epochs by the configured condition columns of the
//! trial table, averages each group sample-wise, and builds a long-form
//! summary table (participant id, condition keys, time, one column per
//! channel).

use ndarray::Array2;
use tracing::{info, warn};

use crate::epochs::Epochs;
use crate::errors::{Error, Result};
use crate::table::{DataTable, Value};

/// One condition-averaged waveform.
#[derive(Debug, Clone)]
pub struct Evoked {
    /// Group name: the `/`-joined condition values.
    pub comment: String,
    /// Number of epochs averaged.
    pub nave: usize,
    /// Sample times relative to the event, in seconds.
    pub times: Vec<f64>,
    /// Averaged signal, shape `[C, T]`.
    pub data: Array2<f64>,
}

/// Average the good epochs per condition group.
///
/// Without condition columns all good epochs form one `"all"` group.  A
/// configured column missing from the trial table is a configuration
/// error; a group whose epochs are all bad is skipped with a warning.
pub fn compute_evokeds(
    epochs: &Epochs,
    trials: &DataTable,
    condition_cols: Option<&[String]>,
    bad_epoch_ixs: &[usize],
    participant_id: &str,
) -> Result<(Vec<Evoked>, DataTable)> {
    if let Some(cols) = condition_cols {
        for col in cols {
            if trials.column_index(col).is_none() {
                return Err(Error::config(format!(
                    "condition column {col:?} not in the trial table"
                )));
            }
        }
    }

    // Group keys in order of first appearance, one entry per epoch.
    let keys: Vec<Vec<String>> = (0..epochs.n_epochs())
        .map(|e| match condition_cols {
            Some(cols) => cols
                .iter()
                .map(|col| trials.get(e, col).map(|v| v.to_string()).unwrap_or_default())
                .collect(),
            None => vec!["all".to_string()],
        })
        .collect();
    let mut groups: Vec<Vec<String>> = vec![];
    for key in &keys {
        if !groups.contains(key) {
            groups.push(key.clone());
        }
    }

    let times = epochs.times();
    let (_, n_c, n_t) = epochs.data.dim();
    let mut evokeds = vec![];
    let mut table = DataTable::new(evoked_columns(epochs, condition_cols));

    for group in &groups {
        let members: Vec<usize> = (0..epochs.n_epochs())
            .filter(|&e| &keys[e] == group && !bad_epoch_ixs.contains(&e))
            .collect();
        let comment = group.join("/");
        if members.is_empty() {
            warn!(group = %comment, "all epochs bad, no evoked computed");
            continue;
        }

        let mut mean = Array2::<f64>::zeros((n_c, n_t));
        for &e in &members {
            mean += &epochs.data.slice(ndarray::s![e, .., ..]);
        }
        mean /= members.len() as f64;

        for (t_ix, &t) in times.iter().enumerate() {
            let mut row = vec![Value::Str(participant_id.to_string())];
            match condition_cols {
                Some(_) => row.extend(group.iter().map(|v| Value::Str(v.clone()))),
                None => row.push(Value::Str(comment.clone())),
            }
            row.push(Value::Float(t));
            row.extend((0..n_c).map(|c| Value::Float(mean[[c, t_ix]])));
            table.push_row(row)?;
        }

        evokeds.push(Evoked {
            comment,
            nave: members.len(),
            times: times.clone(),
            data: mean,
        });
    }

    info!(n_evokeds = evokeds.len(), "evokeds computed");
    Ok((evokeds, table))
}

fn evoked_columns(epochs: &Epochs, condition_cols: Option<&[String]>) -> Vec<String> {
    let mut columns = vec!["participant_id".to_string()];
    match condition_cols {
        Some(cols) => columns.extend(cols.iter().cloned()),
        None => columns.push("condition".to_string()),
    }
    columns.push("time".to_string());
    columns.extend(epochs.channels.iter().map(|c| c.name.clone()));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::raw::RawRecording;
    use ndarray::{Array2, Array3};

    fn toy(n_e: usize) -> (Epochs, DataTable) {
        // Epoch e is constant at e across channels and time.
        let data = Array3::from_shape_fn((n_e, 2, 10), |(e, _, _)| e as f64);
        let raw = RawRecording::new(Array2::zeros((2, 1)), 100.0, &["Cz", "Pz"]);
        let epochs = Epochs {
            data,
            tmin: 0.0,
            sfreq: 100.0,
            events: (0..n_e).map(|i| Event { onset_sample: i, code: 1 }).collect(),
            channels: raw.channels,
        };
        let mut trials = DataTable::new(vec!["condition".into()]);
        for e in 0..n_e {
            trials
                .push_row(vec![Value::Str(if e % 2 == 0 { "a" } else { "b" }.into())])
                .unwrap();
        }
        (epochs, trials)
    }

    #[test]
    fn one_group_per_condition_value() {
        let (epochs, trials) = toy(4);
        let cols = vec!["condition".to_string()];
        let (evokeds, df) =
            compute_evokeds(&epochs, &trials, Some(&cols), &[], "S01").unwrap();
        assert_eq!(evokeds.len(), 2);
        assert_eq!(evokeds[0].comment, "a");
        assert_eq!(evokeds[1].comment, "b");
        // "a" averages epochs 0 and 2 → 1.0; "b" averages 1 and 3 → 2.0.
        approx::assert_abs_diff_eq!(evokeds[0].data[[0, 0]], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(evokeds[1].data[[0, 0]], 2.0, epsilon = 1e-12);
        assert_eq!(evokeds[0].nave, 2);
        assert_eq!(df.n_rows(), 2 * epochs.n_times());
    }

    #[test]
    fn bad_epochs_are_excluded_from_the_average() {
        let (epochs, trials) = toy(4);
        let cols = vec!["condition".to_string()];
        let (evokeds, _) =
            compute_evokeds(&epochs, &trials, Some(&cols), &[2], "S01").unwrap();
        // "a" now only averages epoch 0.
        approx::assert_abs_diff_eq!(evokeds[0].data[[0, 0]], 0.0, epsilon = 1e-12);
        assert_eq!(evokeds[0].nave, 1);
    }

    #[test]
    fn no_condition_cols_gives_one_overall_evoked() {
        let (epochs, trials) = toy(3);
        let (evokeds, df) = compute_evokeds(&epochs, &trials, None, &[], "S01").unwrap();
        assert_eq!(evokeds.len(), 1);
        assert_eq!(evokeds[0].comment, "all");
        assert_eq!(evokeds[0].nave, 3);
        assert_eq!(df.columns()[1], "condition");
    }

    #[test]
    fn unknown_condition_column_is_config_error() {
        let (epochs, trials) = toy(2);
        let cols = vec!["nope".to_string()];
        assert!(matches!(
            compute_evokeds(&epochs, &trials, Some(&cols), &[], "S01"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn summary_table_rows_carry_times_and_channels() {
        let (epochs, trials) = toy(2);
        let (_, df) = compute_evokeds(&epochs, &trials, None, &[], "S01").unwrap();
        assert_eq!(
            df.columns(),
            &["participant_id", "condition", "time", "Cz", "Pz"]
        );
        assert_eq!(df.n_rows(), epochs.n_times());
    }
}
