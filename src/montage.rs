//! Channel geometry: standard cap layouts and bad-channel interpolation.
//!
//! The builtin `standard-1020` layout places the common 10-20/10-10
//! electrodes on an idealised spherical head (radius 9.5 cm).  Channels
//! whose name is not in the layout (EOG, misc) simply get no position.

use std::f64::consts::PI;

use ndarray::Array1;
use tracing::debug;

use crate::config::Montage;
use crate::errors::{Error, Result};
use crate::raw::{norm_name, RawRecording};

/// Idealised head radius in metres.
const HEAD_RADIUS: f64 = 0.095;

/// `(name, inclination from vertex in deg, azimuth in deg)`; azimuth 0° is
/// the right ear, 90° the nasion, counter-clockwise seen from above.
const STANDARD_1020: &[(&str, f64, f64)] = &[
    ("Fp1", 92.0, 108.0),
    ("Fpz", 92.0, 90.0),
    ("Fp2", 92.0, 72.0),
    ("F7", 92.0, 144.0),
    ("F3", 60.0, 129.0),
    ("Fz", 46.0, 90.0),
    ("F4", 60.0, 51.0),
    ("F8", 92.0, 36.0),
    ("FC5", 71.0, 159.0),
    ("FC1", 32.0, 118.0),
    ("FC2", 32.0, 62.0),
    ("FC6", 71.0, 21.0),
    ("T7", 92.0, 180.0),
    ("C3", 46.0, 180.0),
    ("Cz", 0.0, 0.0),
    ("C4", 46.0, 0.0),
    ("T8", 92.0, 0.0),
    ("CP5", 71.0, 201.0),
    ("CP1", 32.0, 242.0),
    ("CP2", 32.0, 298.0),
    ("CP6", 71.0, 339.0),
    ("P7", 92.0, 216.0),
    ("P3", 60.0, 231.0),
    ("Pz", 46.0, 270.0),
    ("P4", 60.0, 309.0),
    ("P8", 92.0, 324.0),
    ("PO7", 92.0, 234.0),
    ("PO3", 74.0, 245.0),
    ("POz", 69.0, 270.0),
    ("PO4", 74.0, 295.0),
    ("PO8", 92.0, 306.0),
    ("O1", 92.0, 252.0),
    ("Oz", 92.0, 270.0),
    ("O2", 92.0, 288.0),
];

fn spherical(incl_deg: f64, azim_deg: f64) -> [f64; 3] {
    let theta = incl_deg * PI / 180.0;
    let phi = azim_deg * PI / 180.0;
    [
        HEAD_RADIUS * theta.sin() * phi.cos(),
        HEAD_RADIUS * theta.sin() * phi.sin(),
        HEAD_RADIUS * theta.cos(),
    ]
}

/// Assign 3-D positions from the configured montage.
///
/// Channels without a matching layout entry keep `pos = None`; an unknown
/// standard-layout name is a configuration error.
pub fn apply(raw: &mut RawRecording, montage: &Montage) -> Result<()> {
    let positions: Vec<(String, [f64; 3])> = match montage {
        Montage::Standard(name) => {
            if name != "standard-1020" {
                return Err(Error::config(format!(
                    "unknown montage {name:?} (builtin: \"standard-1020\")"
                )));
            }
            STANDARD_1020
                .iter()
                .map(|&(n, incl, azim)| (n.to_string(), spherical(incl, azim)))
                .collect()
        }
        Montage::Custom(entries) => entries.clone(),
    };

    let mut n_placed = 0usize;
    for ch in &mut raw.channels {
        let wanted = norm_name(&ch.name);
        ch.pos = positions
            .iter()
            .find(|(name, _)| norm_name(name) == wanted)
            .map(|&(_, pos)| pos);
        n_placed += usize::from(ch.pos.is_some());
    }
    debug!(n_placed, n_channels = raw.n_channels(), "montage applied");
    Ok(())
}

/// Replace each bad channel by the inverse-square-distance weighted average
/// of the good EEG channels, then clear the bad flags.
///
/// Requires positions on the bad channel and on at least one good channel;
/// interpolating without geometry is a processing error.
pub fn interpolate_bads(raw: &mut RawRecording) -> Result<()> {
    let bad_ixs: Vec<usize> = raw
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.bad)
        .map(|(i, _)| i)
        .collect();
    if bad_ixs.is_empty() {
        return Ok(());
    }

    let good_ixs = raw.good_eeg_indices();
    for &bad in &bad_ixs {
        let target = raw.channels[bad].pos.ok_or_else(|| {
            Error::processing(format!(
                "cannot interpolate {:?} without a montage position",
                raw.channels[bad].name
            ))
        })?;

        let mut weights: Vec<(usize, f64)> = vec![];
        for &good in &good_ixs {
            let Some(pos) = raw.channels[good].pos else {
                continue;
            };
            let d2 = (pos[0] - target[0]).powi(2)
                + (pos[1] - target[1]).powi(2)
                + (pos[2] - target[2]).powi(2);
            weights.push((good, 1.0 / d2.max(1e-12)));
        }
        if weights.is_empty() {
            return Err(Error::processing(format!(
                "no positioned good channels to interpolate {:?} from",
                raw.channels[bad].name
            )));
        }

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        let mut blended = Array1::<f64>::zeros(raw.n_samples());
        for (good, w) in weights {
            blended.scaled_add(w / total, &raw.data.row(good));
        }
        raw.data.row_mut(bad).assign(&blended);
    }

    for &bad in &bad_ixs {
        raw.channels[bad].bad = false;
    }
    debug!(n_interpolated = bad_ixs.len(), "bad channels interpolated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Montage;
    use ndarray::Array2;

    fn cap(names: &[&str]) -> RawRecording {
        let data = Array2::from_shape_fn((names.len(), 64), |(c, t)| {
            (c as f64 + 1.0) * (t as f64 * 0.1).sin()
        });
        RawRecording::new(data, 100.0, names)
    }

    #[test]
    fn standard_layout_places_known_channels_only() {
        let mut raw = cap(&["Fz", "Cz", "VEOG"]);
        apply(&mut raw, &Montage::Standard("standard-1020".into())).unwrap();
        assert!(raw.channels[0].pos.is_some());
        assert!(raw.channels[1].pos.is_some());
        assert!(raw.channels[2].pos.is_none());
        // Cz sits at the vertex.
        let cz = raw.channels[1].pos.unwrap();
        approx::assert_abs_diff_eq!(cz[2], HEAD_RADIUS, epsilon = 1e-12);
    }

    #[test]
    fn unknown_layout_is_config_error() {
        let mut raw = cap(&["Fz"]);
        let err = apply(&mut raw, &Montage::Standard("biosemi256".into()));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn positions_lie_on_the_head_sphere() {
        let mut raw = cap(&["Fp1", "F7", "Oz", "C3", "P4"]);
        apply(&mut raw, &Montage::Standard("standard-1020".into())).unwrap();
        for ch in &raw.channels {
            let p = ch.pos.unwrap();
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            approx::assert_abs_diff_eq!(r, HEAD_RADIUS, epsilon = 1e-9);
        }
    }

    #[test]
    fn interpolation_blends_neighbours_and_clears_flags() {
        let mut raw = cap(&["Fz", "Cz", "Pz"]);
        apply(&mut raw, &Montage::Standard("standard-1020".into())).unwrap();
        // Make the bad channel wildly different from its neighbours.
        raw.data.row_mut(1).fill(1000.0);
        raw.mark_bads(&["Cz".into()]).unwrap();
        interpolate_bads(&mut raw).unwrap();
        assert!(!raw.channels[1].bad);
        // Interpolated values are within the range spanned by the sources.
        for t in 0..raw.n_samples() {
            let lo = raw.data[[0, t]].min(raw.data[[2, t]]);
            let hi = raw.data[[0, t]].max(raw.data[[2, t]]);
            let v = raw.data[[1, t]];
            assert!(v >= lo - 1e-9 && v <= hi + 1e-9, "t={t}: {v} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn interpolation_without_positions_fails() {
        let mut raw = cap(&["Fz", "Cz"]);
        raw.mark_bads(&["Cz".into()]).unwrap();
        assert!(matches!(
            interpolate_bads(&mut raw),
            Err(Error::Processing(_))
        ));
    }
}
