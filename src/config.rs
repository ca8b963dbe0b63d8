//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the immutable snapshot of every tunable parameter
//! for one participant's run.  It is captured once at entry, threaded to
//! every stage, and returned unchanged to the caller for audit.  The only
//! mutation path is [`PipelineConfig::with_bad_channels`], which produces a
//! derived copy for the single bad-channel restart pass.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to handle bad channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BadChannelSpec {
    /// Detect bad channels automatically and restart once with the result.
    Auto,
    /// Interpolate exactly these channels; detection is skipped.
    List(Vec<String>),
    /// Leave all channels untouched.
    None,
}

impl BadChannelSpec {
    /// True for the `Auto` sentinel (the only value that can trigger the
    /// restart pass).
    pub fn is_auto(&self) -> bool {
        matches!(self, BadChannelSpec::Auto)
    }
}

/// Ocular-artifact correction method.
///
/// The choice between a decomposition method and a pre-computed coefficient
/// file is made here by the caller, not by probing the filesystem at run
/// time, so the control flow stays testable without real files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OcularCorrection {
    /// Estimate EOG propagation coefficients from the data itself.
    Ica(IcaMethod),
    /// Load channel × EOG propagation coefficients from a CSV file.
    Coefficients(PathBuf),
    /// Correction disabled.
    Off,
}

/// Decomposition flavour used to estimate ocular components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcaMethod {
    FastIca,
    Infomax,
}

/// Electrode selection for a derived bipolar EOG channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EogSpec {
    /// Pick the first two matches from a builtin candidate list.
    Auto,
    /// Use exactly this electrode pair.
    Pair(String, String),
}

/// Channel positions: a named builtin layout or explicit coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Montage {
    /// One of the builtin standard cap layouts (see [`crate::montage`]).
    Standard(String),
    /// Explicit `(name, [x, y, z])` positions in metres.
    Custom(Vec<(String, [f64; 3])>),
}

/// A named response component: a time window and a channel region of
/// interest, summarised into one mean-amplitude column per epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Column name in the trial table (e.g. `"N400"`).
    pub name: String,
    /// Window start relative to the event, in seconds.
    pub tmin: f64,
    /// Window end relative to the event, in seconds.
    pub tmax: f64,
    /// Channel names averaged over (the region of interest).
    pub roi: Vec<String>,
}

/// Which representation the tabular/native output sinks produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// CSV data frames only.
    Tabular,
    /// Native (safetensors) objects only.
    Native,
    /// Both representations.
    Both,
}

/// Configuration snapshot for one participant's pipeline run.
///
/// All fields are `pub` so a config can be built with struct-update syntax:
///
/// ```
/// use erppipe::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     downsample_sfreq: Some(250.0),
///     highpass_freq: 0.3,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ocular-artifact correction method.
    ///
    /// Default: `Ica(FastIca)`.
    pub ocular_correction: OcularCorrection,

    /// Bad-channel handling: automatic detection (with one restart),
    /// an explicit list, or none.
    ///
    /// Default: `Auto`.
    pub bad_channels: BadChannelSpec,

    /// 0-based data-row indices to drop from the behavioral log.
    ///
    /// Default: empty.
    pub skip_log_rows: Vec<usize>,

    /// `(column, values)` pairs: log rows whose `column` holds one of the
    /// `values` are dropped before fusion.
    ///
    /// Default: empty.
    pub skip_log_conditions: Vec<(String, Vec<String>)>,

    /// Target sampling rate in Hz.  `None` keeps the recording's rate.
    ///
    /// Default: `None`.
    pub downsample_sfreq: Option<f64>,

    /// Electrodes for the derived vertical EOG channel.
    ///
    /// Default: `Auto`.
    pub veog_channels: EogSpec,

    /// Electrodes for the derived horizontal EOG channel.
    ///
    /// Default: `Auto`.
    pub heog_channels: EogSpec,

    /// Channel geometry source.
    ///
    /// Default: `Standard("standard-1020")`.
    pub montage: Montage,

    /// Band-pass lower cutoff in Hz.
    ///
    /// Default: `0.1`.
    pub highpass_freq: f64,

    /// Band-pass upper cutoff in Hz.
    ///
    /// Default: `30.0`.
    pub lowpass_freq: f64,

    /// Epoch window start relative to the event, in seconds.
    ///
    /// Default: `-0.5`.
    pub epochs_tmin: f64,

    /// Epoch window end relative to the event, in seconds.  The sample at
    /// `epochs_tmax` itself is excluded (even-length policy).
    ///
    /// Default: `1.5`.
    pub epochs_tmax: f64,

    /// Baseline window `(start, end)` in seconds relative to the event.
    ///
    /// Default: `(-0.2, 0.0)`.
    pub baseline: (f64, f64),

    /// Explicit annotation-label → trigger-code map.  When set it fully
    /// replaces the default code derivation; a label with no matching
    /// annotation is a configuration error.
    ///
    /// Default: `None`.
    pub triggers: Option<Vec<(String, i32)>>,

    /// Peak-to-peak rejection threshold (same units as the data).
    ///
    /// Default: `200.0`.
    pub reject_peak_to_peak: f64,

    /// Flat-signal rejection threshold.
    ///
    /// Default: `1.0`.
    pub reject_flat: f64,

    /// Response components summarised into single-trial amplitudes.
    ///
    /// Default: empty.  A fresh empty list is constructed per call; it is
    /// never shared between invocations.
    pub components: Vec<Component>,

    /// Trial-table columns that define the evoked condition groups.
    /// `None` averages all good epochs into a single `"all"` evoked.
    ///
    /// Default: `None`.
    pub condition_cols: Option<Vec<String>>,

    /// Output directory for cleaned continuous data.  `None` skips saving.
    pub clean_dir: Option<PathBuf>,

    /// Output directory for epoched data.  `None` skips saving.
    pub epochs_dir: Option<PathBuf>,

    /// Output directory for the single-trial table.  `None` skips saving.
    pub trials_dir: Option<PathBuf>,

    /// Output directory for evokeds.  `None` skips saving.
    pub evokeds_dir: Option<PathBuf>,

    /// Output directory for channel locations.  `None` skips saving.
    pub export_dir: Option<PathBuf>,

    /// Representation written by the epoch/evoked sinks.
    ///
    /// Default: `Tabular`.
    pub to_df: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocular_correction: OcularCorrection::Ica(IcaMethod::FastIca),
            bad_channels: BadChannelSpec::Auto,
            skip_log_rows: vec![],
            skip_log_conditions: vec![],
            downsample_sfreq: None,
            veog_channels: EogSpec::Auto,
            heog_channels: EogSpec::Auto,
            montage: Montage::Standard("standard-1020".into()),
            highpass_freq: 0.1,
            lowpass_freq: 30.0,
            epochs_tmin: -0.5,
            epochs_tmax: 1.5,
            baseline: (-0.2, 0.0),
            triggers: None,
            reject_peak_to_peak: 200.0,
            reject_flat: 1.0,
            components: vec![],
            condition_cols: None,
            clean_dir: None,
            epochs_dir: None,
            trials_dir: None,
            evokeds_dir: None,
            export_dir: None,
            to_df: OutputFormat::Tabular,
        }
    }
}

impl PipelineConfig {
    /// Derived copy with the bad-channel field replaced by an explicit list.
    ///
    /// This is the only mutation path and is used solely by the restart
    /// pass: because the copy's field is a concrete `List` rather than the
    /// `Auto` sentinel, the second pass cannot trigger another restart.
    pub fn with_bad_channels(&self, channels: Vec<String>) -> Self {
        Self {
            bad_channels: BadChannelSpec::List(channels),
            ..self.clone()
        }
    }
}
