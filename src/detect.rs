//! Automatic bad-epoch and bad-channel detection.
//!
//! Rejection is amplitude based, per epoch and EEG channel: a channel is
//! bad within an epoch when its peak-to-peak amplitude exceeds the
//! rejection threshold or stays below the flat threshold.  An epoch with at
//! least one bad channel is flagged; a channel that is bad in more than 5%
//! of the epochs is reported for interpolation.

use tracing::info;

use crate::epochs::Epochs;
use crate::raw::ChannelKind;

/// Fraction of epochs a channel may be bad in before it is reported.
const CHANNEL_BAD_FRACTION: f64 = 0.05;

/// Detector output: flagged epoch indices and channels worth repairing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BadData {
    /// Indices of epochs with at least one rejected channel.
    pub bad_epoch_ixs: Vec<usize>,
    /// Channels rejected in more than [`CHANNEL_BAD_FRACTION`] of epochs.
    pub auto_channels: Vec<String>,
}

/// Scan all epochs with the configured thresholds.
pub fn get_bads(epochs: &Epochs, reject_peak_to_peak: f64, reject_flat: f64) -> BadData {
    let eeg_ixs: Vec<usize> = epochs
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.kind == ChannelKind::Eeg)
        .map(|(i, _)| i)
        .collect();

    let n_e = epochs.n_epochs();
    let mut bad_epoch_ixs = vec![];
    let mut bad_counts = vec![0usize; epochs.n_channels()];

    for e in 0..n_e {
        let mut epoch_bad = false;
        for &c in &eeg_ixs {
            let row = epochs.data.slice(ndarray::s![e, c, ..]);
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &v in row.iter() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let p2p = hi - lo;
            if p2p > reject_peak_to_peak || p2p < reject_flat {
                epoch_bad = true;
                bad_counts[c] += 1;
            }
        }
        if epoch_bad {
            bad_epoch_ixs.push(e);
        }
    }

    let auto_channels: Vec<String> = eeg_ixs
        .iter()
        .filter(|&&c| n_e > 0 && bad_counts[c] as f64 / n_e as f64 > CHANNEL_BAD_FRACTION)
        .map(|&c| epochs.channels[c].name.clone())
        .collect();

    info!(
        n_bad_epochs = bad_epoch_ixs.len(),
        n_auto_channels = auto_channels.len(),
        "bad-data detection"
    );
    BadData { bad_epoch_ixs, auto_channels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::raw::RawRecording;
    use ndarray::{Array2, Array3};

    /// Epochs built directly, bypassing extraction.
    fn epochs_from(data: Array3<f64>, names: &[&str]) -> Epochs {
        let n_e = data.dim().0;
        let raw = RawRecording::new(Array2::zeros((names.len(), 1)), 100.0, names);
        Epochs {
            data,
            tmin: 0.0,
            sfreq: 100.0,
            events: (0..n_e).map(|i| Event { onset_sample: i, code: 1 }).collect(),
            channels: raw.channels,
        }
    }

    #[test]
    fn quiet_data_has_no_bads() {
        let data = Array3::from_shape_fn((10, 2, 50), |(_, _, t)| 10.0 * (t as f64 * 0.7).sin());
        let bads = get_bads(&epochs_from(data, &["Fz", "Cz"]), 200.0, 1.0);
        assert!(bads.bad_epoch_ixs.is_empty());
        assert!(bads.auto_channels.is_empty());
    }

    #[test]
    fn one_noisy_epoch_is_flagged_without_the_channel() {
        let mut data =
            Array3::from_shape_fn((40, 2, 50), |(_, _, t)| 10.0 * (t as f64 * 0.7).sin());
        // One epoch spikes on one channel: epoch flagged, channel kept
        // (1/40 = 2.5% < 5%).
        data[[3, 1, 10]] = 500.0;
        let bads = get_bads(&epochs_from(data, &["Fz", "Cz"]), 200.0, 1.0);
        assert_eq!(bads.bad_epoch_ixs, vec![3]);
        assert!(bads.auto_channels.is_empty());
    }

    #[test]
    fn persistently_noisy_channel_is_reported() {
        let mut data =
            Array3::from_shape_fn((20, 2, 50), |(_, _, t)| 10.0 * (t as f64 * 0.7).sin());
        for e in 0..20 {
            data[[e, 0, 25]] = 400.0; // noisy in every epoch
        }
        let bads = get_bads(&epochs_from(data, &["Broken", "Cz"]), 200.0, 1.0);
        assert_eq!(bads.auto_channels, vec!["Broken".to_string()]);
        assert_eq!(bads.bad_epoch_ixs.len(), 20);
    }

    #[test]
    fn flat_channel_is_rejected_too() {
        let mut data =
            Array3::from_shape_fn((10, 2, 50), |(_, _, t)| 10.0 * (t as f64 * 0.7).sin());
        for e in 0..10 {
            for t in 0..50 {
                data[[e, 0, t]] = 0.0;
            }
        }
        let bads = get_bads(&epochs_from(data, &["Dead", "Cz"]), 200.0, 1.0);
        assert_eq!(bads.auto_channels, vec!["Dead".to_string()]);
    }

    #[test]
    fn eog_channels_are_ignored() {
        let mut data =
            Array3::from_shape_fn((10, 2, 50), |(_, _, t)| 10.0 * (t as f64 * 0.7).sin());
        for e in 0..10 {
            data[[e, 1, 25]] = 1000.0; // blink on the EOG channel
        }
        let mut epochs = epochs_from(data, &["Cz", "VEOG"]);
        epochs.channels[1].kind = ChannelKind::Eog;
        let bads = get_bads(&epochs, 200.0, 1.0);
        assert!(bads.bad_epoch_ixs.is_empty());
        assert!(bads.auto_channels.is_empty());
    }
}
