//! Common-average reference.
//!
//! Subtracts, at every time point, the mean over the good EEG channels from
//! each EEG channel.  EOG and misc channels contribute nothing to the
//! reference and are left unchanged.

use ndarray::Array1;

use crate::raw::RawRecording;

/// Re-reference the recording in place to the common average.
pub fn average_reference_inplace(raw: &mut RawRecording) {
    let contributors = raw.good_eeg_indices();
    if contributors.is_empty() {
        return;
    }

    let n_t = raw.n_samples();
    let mut means = Array1::<f64>::zeros(n_t);
    for &ix in &contributors {
        means += &raw.data.row(ix);
    }
    means /= contributors.len() as f64;

    for ix in raw.eeg_indices() {
        let mut row = raw.data.row_mut(ix);
        row -= &means;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{ChannelKind, RawRecording};
    use ndarray::{Array2, Axis};

    #[test]
    fn channel_sum_is_zero_after_reference() {
        let data = Array2::from_shape_fn((4, 256), |(c, t)| ((c * 7 + t * 3) as f64).sin());
        let mut raw = RawRecording::new(data, 256.0, &["Fz", "Cz", "Pz", "Oz"]);
        average_reference_inplace(&mut raw);
        for &s in raw.data.sum_axis(Axis(0)).iter() {
            approx::assert_abs_diff_eq!(s, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn channel_differences_are_preserved() {
        let data = Array2::from_shape_fn((2, 10), |(c, _)| if c == 0 { 2.0 } else { 4.0 });
        let mut raw = RawRecording::new(data, 100.0, &["Fz", "Cz"]);
        average_reference_inplace(&mut raw);
        for t in 0..10 {
            approx::assert_abs_diff_eq!(
                raw.data[[0, t]] - raw.data[[1, t]],
                -2.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn eog_channels_do_not_contribute_and_stay_untouched() {
        let data = Array2::from_shape_fn((3, 50), |(c, _)| c as f64);
        let mut raw = RawRecording::new(data, 100.0, &["Fz", "Cz", "VEOG"]);
        raw.channels[2].kind = ChannelKind::Eog;
        average_reference_inplace(&mut raw);
        // Reference mean over EEG rows only: (0 + 1) / 2 = 0.5.
        approx::assert_abs_diff_eq!(raw.data[[0, 0]], -0.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(raw.data[[1, 0]], 0.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(raw.data[[2, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn bad_channels_are_excluded_from_the_mean() {
        let data = Array2::from_shape_fn((3, 20), |(c, _)| if c == 2 { 1000.0 } else { 1.0 });
        let mut raw = RawRecording::new(data, 100.0, &["Fz", "Cz", "Broken"]);
        raw.channels[2].bad = true;
        average_reference_inplace(&mut raw);
        // Mean over good channels is 1.0, not contaminated by the bad row.
        approx::assert_abs_diff_eq!(raw.data[[0, 0]], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(raw.data[[2, 0]], 999.0, epsilon = 1e-12);
    }
}
