//! Continuous multi-channel recording.
//!
//! [`RawRecording`] owns the `[C, T]` signal, the per-channel metadata
//! (name, kind, bad flag, optional 3-D position) and the annotation stream
//! carrying the stimulus markers.  Every preprocessing stage mutates one
//! recording in place; nothing is shared across pipeline invocations.

use std::path::Path;

use ndarray::{Array1, Array2};

use crate::errors::{Error, Result};
use crate::io;

/// What a channel records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Eeg,
    Eog,
    Misc,
}

/// Per-channel metadata.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
    pub bad: bool,
    /// Position in metres, assigned by the montage stage.
    pub pos: Option<[f64; 3]>,
}

/// One marker from the recording's annotation stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Onset in seconds from the start of the recording.  Kept in seconds
    /// so it survives resampling unchanged.
    pub onset: f64,
    /// Marker label, e.g. `"Stimulus/S 11"`.
    pub description: String,
}

/// Continuous recording: `[C, T]` data plus channel and marker metadata.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Signal, shape `[C, T]`, one row per channel.
    pub data: Array2<f64>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    /// One entry per data row, same order.
    pub channels: Vec<Channel>,
    /// Marker stream, ordered by onset.
    pub annotations: Vec<Annotation>,
}

/// Channel-name normalisation used for all lookups: lowercase, spaces
/// stripped (`"fp 1"` matches `"Fp1"`).
pub(crate) fn norm_name(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

impl RawRecording {
    /// Build a recording from data and channel names; all channels start as
    /// EEG, not bad, without positions.
    pub fn new(data: Array2<f64>, sfreq: f64, ch_names: &[&str]) -> Self {
        assert_eq!(data.nrows(), ch_names.len(), "one name per data row");
        let channels = ch_names
            .iter()
            .map(|&name| Channel {
                name: name.to_string(),
                kind: ChannelKind::Eeg,
                bad: false,
                pos: None,
            })
            .collect();
        Self { data, sfreq, channels, annotations: vec![] }
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Index of the channel with this (normalised) name.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let wanted = norm_name(name);
        self.channels.iter().position(|c| norm_name(&c.name) == wanted)
    }

    /// Indices of all EEG channels.
    pub fn eeg_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ChannelKind::Eeg)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of EEG channels not flagged bad.
    pub fn good_eeg_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ChannelKind::Eeg && !c.bad)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of EOG channels (derived or recorded).
    pub fn eog_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ChannelKind::Eog)
            .map(|(i, _)| i)
            .collect()
    }

    /// Append a derived channel as a new data row.
    pub fn push_channel(&mut self, name: &str, kind: ChannelKind, row: Array1<f64>) -> Result<()> {
        if row.len() != self.n_samples() {
            return Err(Error::processing(format!(
                "derived channel {name:?} has {} samples, recording has {}",
                row.len(),
                self.n_samples()
            )));
        }
        let (n_ch, n_t) = self.data.dim();
        let mut grown = Array2::zeros((n_ch + 1, n_t));
        grown.slice_mut(ndarray::s![..n_ch, ..]).assign(&self.data);
        grown.row_mut(n_ch).assign(&row);
        self.data = grown;
        self.channels.push(Channel {
            name: name.to_string(),
            kind,
            bad: false,
            pos: None,
        });
        Ok(())
    }

    /// Flag the listed channels as bad.  Unknown names are a configuration
    /// error: a typo would otherwise silently skip interpolation.
    pub fn mark_bads(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let ix = self
                .channel_index(name)
                .ok_or_else(|| Error::config(format!("unknown bad channel {name:?}")))?;
            self.channels[ix].bad = true;
        }
        Ok(())
    }

    /// Load a recording from a safetensors file.
    ///
    /// Expected keys: `data` `[C, T]`, `sfreq` `[1]`, `ch_names`
    /// (newline-joined string tensor), optional `chan_pos` `[C, 3]`,
    /// optional `marker_onsets` `[N]` (seconds) with `marker_labels`
    /// (newline-joined).
    pub fn load(path: &Path) -> Result<Self> {
        let file = io::StFile::open(path)?;

        let data = file.tensor_2d("data")?;
        let sfreq = *file
            .tensor_1d("sfreq")?
            .first()
            .ok_or_else(|| Error::Format("sfreq tensor is empty".into()))?;
        let ch_names = file.string_list("ch_names")?;
        if ch_names.len() != data.nrows() {
            return Err(Error::Format(format!(
                "{} channel names for {} data rows",
                ch_names.len(),
                data.nrows()
            )));
        }

        let mut channels: Vec<Channel> = ch_names
            .iter()
            .map(|name| Channel {
                name: name.clone(),
                kind: ChannelKind::Eeg,
                bad: false,
                pos: None,
            })
            .collect();

        if file.has("chan_pos") {
            let pos = file.tensor_2d("chan_pos")?;
            if pos.nrows() != channels.len() || pos.ncols() != 3 {
                return Err(Error::Format("chan_pos must be [C, 3]".into()));
            }
            for (ch, row) in channels.iter_mut().zip(pos.rows()) {
                ch.pos = Some([row[0], row[1], row[2]]);
            }
        }

        let annotations = if file.has("marker_onsets") {
            let onsets = file.tensor_1d("marker_onsets")?;
            let labels = file.string_list("marker_labels")?;
            if labels.len() != onsets.len() {
                return Err(Error::Format(format!(
                    "{} marker labels for {} onsets",
                    labels.len(),
                    onsets.len()
                )));
            }
            onsets
                .iter()
                .zip(labels)
                .map(|(&onset, description)| Annotation { onset, description })
                .collect()
        } else {
            vec![]
        };

        Ok(Self { data, sfreq, channels, annotations })
    }
}
