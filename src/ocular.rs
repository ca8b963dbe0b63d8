//! Ocular channels and ocular-artifact correction.
//!
//! Two jobs: derive bipolar VEOG/HEOG channels from scalp electrodes, and
//! remove eye-movement artifact from the data channels.  Correction
//! subtracts `coeffs · eog` from every channel, where the propagation
//! coefficients come either from a pre-computed file or are estimated from
//! the recording itself by least-squares regression on the EOG channels.

use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use crate::config::{EogSpec, IcaMethod, OcularCorrection};
use crate::errors::{Error, Result};
use crate::raw::{ChannelKind, RawRecording};
use crate::table::{DataTable, Value};

/// Default electrode candidates for the vertical EOG (above/below the eye).
const VEOG_CANDIDATES: &[&str] = &["Fp1", "FP1", "IO1", "Auge_u"];
/// Default electrode candidates for the horizontal EOG (outer canthi).
const HEOG_CANDIDATES: &[&str] = &["F9", "F10", "Afp9", "Afp10"];

/// Derive VEOG and HEOG as bipolar differences and append them as EOG
/// channels.  With `Auto`, the first two candidates present are used; if
/// fewer than two are found the channel is skipped with a warning.  An
/// explicit pair naming a missing electrode is a configuration error.
pub fn add_heog_veog(raw: &mut RawRecording, veog: &EogSpec, heog: &EogSpec) -> Result<()> {
    add_bipolar(raw, "VEOG", veog, VEOG_CANDIDATES)?;
    add_bipolar(raw, "HEOG", heog, HEOG_CANDIDATES)?;
    Ok(())
}

fn add_bipolar(
    raw: &mut RawRecording,
    name: &str,
    spec: &EogSpec,
    candidates: &[&str],
) -> Result<()> {
    if let Some(ix) = raw.channel_index(name) {
        // Already recorded; just make sure it is typed as EOG.
        raw.channels[ix].kind = ChannelKind::Eog;
        debug!(channel = name, "using recorded EOG channel");
        return Ok(());
    }

    let pair = match spec {
        EogSpec::Pair(a, b) => {
            let ia = raw
                .channel_index(a)
                .ok_or_else(|| Error::config(format!("{name} electrode {a:?} not found")))?;
            let ib = raw
                .channel_index(b)
                .ok_or_else(|| Error::config(format!("{name} electrode {b:?} not found")))?;
            Some((ia, ib))
        }
        EogSpec::Auto => {
            // Candidates carry alternate spellings of the same site and
            // channel lookup is case-insensitive, so dedupe by resolved
            // index; a channel must never be paired with itself.
            let mut found: Vec<usize> = vec![];
            for c in candidates {
                if let Some(ix) = raw.channel_index(c) {
                    if !found.contains(&ix) {
                        found.push(ix);
                    }
                }
            }
            if found.len() >= 2 {
                Some((found[0], found[1]))
            } else {
                None
            }
        }
    };

    match pair {
        Some((a, b)) => {
            let row = raw.data.row(a).to_owned() - raw.data.row(b).to_owned();
            raw.push_channel(name, ChannelKind::Eog, row)?;
            debug!(channel = name, "derived bipolar EOG channel");
        }
        None => warn!(channel = name, "no electrode pair found, channel skipped"),
    }
    Ok(())
}

/// Remove ocular artifact according to the configured method.  Exactly one
/// branch runs, or none when correction is off.
pub fn correct(raw: &mut RawRecording, method: &OcularCorrection) -> Result<()> {
    match method {
        OcularCorrection::Off => Ok(()),
        OcularCorrection::Coefficients(path) => correct_with_coefficients(raw, path),
        OcularCorrection::Ica(flavour) => correct_by_regression(raw, *flavour),
    }
}

/// Apply a pre-computed channel × EOG coefficient matrix.
///
/// File format: CSV with a `ch_name` column followed by one column per EOG
/// channel name.  Rows for channels absent from the recording are skipped;
/// a coefficient column with no matching EOG channel is a configuration
/// error.
pub fn correct_with_coefficients(raw: &mut RawRecording, path: &Path) -> Result<()> {
    let table = DataTable::from_csv(path)?;
    if table.column_index("ch_name").is_none() {
        return Err(Error::Format(format!(
            "coefficient file {} has no ch_name column",
            path.display()
        )));
    }

    let eog_cols: Vec<(String, usize)> = table
        .columns()
        .iter()
        .filter(|c| c.as_str() != "ch_name")
        .map(|c| {
            raw.channel_index(c)
                .map(|ix| (c.clone(), ix))
                .ok_or_else(|| {
                    Error::config(format!("coefficient column {c:?} has no EOG channel"))
                })
        })
        .collect::<Result<_>>()?;

    let eog_rows: Vec<Array1<f64>> = eog_cols
        .iter()
        .map(|&(_, ix)| raw.data.row(ix).to_owned())
        .collect();

    for row_ix in 0..table.n_rows() {
        let Some(Value::Str(ch_name)) = table.get(row_ix, "ch_name") else {
            continue;
        };
        let Some(target) = raw.channel_index(ch_name) else {
            debug!(channel = %ch_name, "coefficient row has no matching channel");
            continue;
        };
        for ((col, _), eog) in eog_cols.iter().zip(&eog_rows) {
            let coeff = match table.get(row_ix, col) {
                Some(Value::Float(v)) => *v,
                Some(Value::Int(v)) => *v as f64,
                _ => continue,
            };
            let mut row = raw.data.row_mut(target);
            row.scaled_add(-coeff, eog);
        }
    }
    Ok(())
}

/// Estimate propagation coefficients from the data and subtract the EOG
/// contribution from every non-EOG channel.
///
/// For each channel `x` this solves the least-squares system
/// `(E·Eᵀ) b = E·x` over the EOG rows `E` and subtracts `bᵀ·E`.  The
/// decomposition flavour only selects the estimator family; both flavours
/// share this closed-form solution.
pub fn correct_by_regression(raw: &mut RawRecording, flavour: IcaMethod) -> Result<()> {
    let eog_ixs = raw.eog_indices();
    if eog_ixs.is_empty() {
        return Err(Error::processing(
            "ocular correction needs at least one EOG channel",
        ));
    }
    debug!(?flavour, n_eog = eog_ixs.len(), "estimating ocular coefficients");

    let k = eog_ixs.len();
    let n_t = raw.n_samples();
    let mut eog = Array2::<f64>::zeros((k, n_t));
    for (r, &ix) in eog_ixs.iter().enumerate() {
        eog.row_mut(r).assign(&raw.data.row(ix));
    }

    // Gram matrix of the EOG rows.
    let mut gram = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in 0..k {
            gram[i][j] = eog.row(i).dot(&eog.row(j));
        }
    }

    let targets: Vec<usize> = (0..raw.n_channels())
        .filter(|ix| !eog_ixs.contains(ix))
        .collect();
    for target in targets {
        let x = raw.data.row(target).to_owned();
        let rhs: Vec<f64> = (0..k).map(|i| eog.row(i).dot(&x)).collect();
        let coeffs = solve_small(&gram, &rhs).ok_or_else(|| {
            Error::processing("ocular regression is singular (flat EOG channel?)")
        })?;
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(Error::processing("ocular regression did not converge"));
        }
        let mut row = raw.data.row_mut(target);
        for (i, &b) in coeffs.iter().enumerate() {
            row.scaled_add(-b, &eog.row(i));
        }
    }
    Ok(())
}

/// Gaussian elimination with partial pivoting for the tiny (k ≤ 2 in
/// practice) coefficient systems.  Returns `None` when singular.
fn solve_small(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() < 1e-300 {
            return None;
        }
        m.swap(col, pivot);
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col] / m[col][col];
            for k in col..=n {
                let v = m[col][k];
                m[row][k] -= factor * v;
            }
        }
    }
    Some((0..n).map(|i| m[i][n] / m[i][i]).collect())
}
