//! Event-locked epoch extraction.
//!
//! Windows the filtered recording around each accepted event, applies
//! baseline correction, then crops to `[tmin, tmax)` — the sample at `tmax`
//! itself is dropped so every epoch has exactly
//! `round((tmax - tmin) * sfreq)` samples.  The crop is a separate,
//! order-sensitive step: it runs after epoching and baseline correction,
//! never before.

use ndarray::{s, Array3};
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::events::Event;
use crate::raw::{norm_name, Channel, RawRecording};

/// Fixed-length, event-aligned windows plus the metadata they carry.
#[derive(Debug, Clone)]
pub struct Epochs {
    /// Signal, shape `[E, C, T]`.
    pub data: Array3<f64>,
    /// Time of the first sample relative to the event, in seconds.
    pub tmin: f64,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    /// The accepted events, one per epoch, in epoch order.
    pub events: Vec<Event>,
    /// Channel metadata carried over from the recording.
    pub channels: Vec<Channel>,
}

impl Epochs {
    /// Cut inclusive `[tmin, tmax]` windows around the events and apply
    /// baseline correction.  Events whose window would leave the recording
    /// are dropped.
    pub fn extract(
        raw: &RawRecording,
        events: &[Event],
        tmin: f64,
        tmax: f64,
        baseline: (f64, f64),
    ) -> Result<Self> {
        if tmax <= tmin {
            return Err(Error::config(format!(
                "epoch window [{tmin}, {tmax}] is empty"
            )));
        }
        let sfreq = raw.sfreq;
        let offset = (tmin * sfreq).round() as isize;
        // Inclusive window: one extra sample beyond the exclusive length.
        let n_t = ((tmax - tmin) * sfreq).round() as usize + 1;
        let n_ch = raw.n_channels();
        let n_samples = raw.n_samples() as isize;

        let accepted: Vec<&Event> = events
            .iter()
            .filter(|e| {
                let start = e.onset_sample as isize + offset;
                start >= 0 && start + n_t as isize <= n_samples
            })
            .collect();
        if accepted.len() < events.len() {
            debug!(
                dropped = events.len() - accepted.len(),
                "events too close to a recording edge"
            );
        }

        let mut data = Array3::zeros((accepted.len(), n_ch, n_t));
        for (e, event) in accepted.iter().enumerate() {
            let start = (event.onset_sample as isize + offset) as usize;
            data.slice_mut(s![e, .., ..])
                .assign(&raw.data.slice(s![.., start..start + n_t]));
        }

        let mut epochs = Self {
            data,
            tmin,
            sfreq,
            events: accepted.into_iter().cloned().collect(),
            channels: raw.channels.clone(),
        };
        epochs.apply_baseline(baseline)?;
        info!(
            n_epochs = epochs.n_epochs(),
            n_samples = n_t,
            "epochs extracted"
        );
        Ok(epochs)
    }

    /// Subtract the per-channel mean of the baseline window from every
    /// epoch.  Samples with `a <= t <= b` form the baseline; a window
    /// holding no samples of the epoch is a configuration error.
    pub fn apply_baseline(&mut self, (a, b): (f64, f64)) -> Result<()> {
        let ixs: Vec<usize> = self
            .times()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= a && t <= b)
            .map(|(i, _)| i)
            .collect();
        if ixs.is_empty() {
            return Err(Error::config(format!(
                "baseline window [{a}, {b}] contains no epoch samples"
            )));
        }
        let (n_e, n_c, _) = self.data.dim();
        for e in 0..n_e {
            for c in 0..n_c {
                let mean: f64 =
                    ixs.iter().map(|&i| self.data[[e, c, i]]).sum::<f64>() / ixs.len() as f64;
                self.data
                    .slice_mut(s![e, c, ..])
                    .mapv_inplace(|v| v - mean);
            }
        }
        Ok(())
    }

    /// Drop the final sample of every epoch, turning the inclusive
    /// `[tmin, tmax]` window into `[tmin, tmax)`.  Must run after
    /// extraction; keeps the epoch length even for typical windows.
    pub fn crop_excluding_tmax(&mut self) {
        let (_, _, n_t) = self.data.dim();
        if n_t == 0 {
            return;
        }
        self.data = self.data.slice(s![.., .., ..n_t - 1]).to_owned();
    }

    pub fn n_epochs(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    /// Sample times relative to the event, in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.n_times())
            .map(|i| self.tmin + i as f64 / self.sfreq)
            .collect()
    }

    /// Index of a channel by (normalised) name.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let wanted = norm_name(name);
        self.channels
            .iter()
            .position(|c| norm_name(&c.name) == wanted)
    }
}
