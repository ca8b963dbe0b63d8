//! # erppipe — single-participant ERP preprocessing in pure Rust
//!
//! `erppipe` turns one participant's continuous EEG recording and behavioral
//! log into single-trial component amplitudes and condition-averaged evoked
//! waveforms.  Every DSP step is pure Rust + [RustFFT](https://crates.io/crates/rustfft);
//! no Python, no BLAS, no C libraries.
//!
//! ## Pipeline overview
//!
//! ```text
//! S01.safetensors + S01.tsv
//!   │
//!   ├─ raw::load()            safetensors reader → RawRecording [C, T]
//!   ├─ resample::downsample() FFT resampler → target sfreq (optional)
//!   ├─ ocular::add_heog_veog  bipolar VEOG/HEOG derivation
//!   ├─ montage::apply         3-D electrode positions (standard-1020)
//!   ├─ bad channels           mark + inverse-distance interpolation
//!   ├─ reference              common average over good EEG channels
//!   ├─ ocular::correct        regression / coefficient-file subtraction
//!   ├─ filter (FIR BP)        firwin + overlap-add → 0.1–30 Hz
//!   ├─ events + epochs        stimulus markers → [E, C, T) windows
//!   ├─ detect::get_bads       peak-to-peak / flat rejection
//!   │     └─ restart once with the detected channel list (bounded)
//!   ├─ trials                 behavioral log fusion + component means
//!   └─ evoked                 condition-grouped averages
//!        │
//!        └─→ PipelineOutput { trials, evokeds, evokeds_table, config }
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use erppipe::{run_participant, Component, PipelineConfig};
//!
//! let cfg = PipelineConfig {
//!     downsample_sfreq: Some(250.0),
//!     components: vec![Component {
//!         name: "N400".into(),
//!         tmin: 0.3,
//!         tmax: 0.5,
//!         roi: vec!["C1".into(), "Cz".into(), "C2".into()],
//!     }],
//!     condition_cols: Some(vec!["condition".into()]),
//!     ..PipelineConfig::default()
//! };
//!
//! let out = run_participant(
//!     Path::new("data/S01.safetensors"),
//!     Path::new("data/S01.tsv"),
//!     &cfg,
//! ).unwrap();
//! println!("{} trials, {} evokeds", out.trials.n_rows(), out.evokeds.len());
//! ```
//!
//! ## Running individual steps
//!
//! Each stage is also exposed as a standalone function:
//!
//! ```no_run
//! use std::path::Path;
//! use erppipe::raw::RawRecording;
//! use erppipe::{average_reference_inplace, band_pass_inplace, downsample};
//!
//! let mut raw = RawRecording::load(Path::new("data/S01.safetensors")).unwrap();
//! downsample(&mut raw, 250.0).unwrap();
//! average_reference_inplace(&mut raw);
//! band_pass_inplace(&mut raw, 0.1, 30.0).unwrap();
//! ```

pub mod config;
pub mod detect;
pub mod epochs;
pub mod errors;
pub mod events;
pub mod evoked;
pub mod filter;
pub mod io;
pub mod logfile;
pub mod montage;
pub mod ocular;
pub mod overrides;
pub mod pipeline;
pub mod raw;
pub mod reference;
pub mod resample;
pub mod table;
pub mod trials;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `erppipe::Foo` without having to know the internal module layout.

// config
pub use config::{
    BadChannelSpec, Component, EogSpec, IcaMethod, Montage, OcularCorrection, OutputFormat,
    PipelineConfig,
};

// errors
pub use errors::{Error, Result};

// pipeline — the main entry point
pub use pipeline::{run_participant, PipelineOutput};

// raw / epochs / events
pub use epochs::Epochs;
pub use events::{resolve_events, Event};
pub use raw::{Annotation, Channel, ChannelKind, RawRecording};

// stages
pub use detect::{get_bads, BadData};
pub use evoked::{compute_evokeds, Evoked};
pub use filter::{apply_fir_zero_phase, band_pass_inplace, design_bandpass, filter_1d};
pub use montage::interpolate_bads;
pub use ocular::{add_heog_veog, correct as correct_ocular};
pub use reference::average_reference_inplace;
pub use resample::{downsample, resample};
pub use trials::{compute_single_trials, fuse_metadata};

// tables and overrides
pub use logfile::read_log;
pub use overrides::{participant_id, Override};
pub use table::{DataTable, Value};

// io — safetensors helpers and output sinks
pub use io::{StFile, StWriter};
