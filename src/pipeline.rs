//! Per-participant orchestration.
//!
//! [`run_participant`] drives the full chain for one recording: downsample,
//! derived EOG channels, montage, bad-channel repair, average reference,
//! ocular correction, band-pass, epoching, metadata fusion, rejection,
//! single-trial metrics, evokeds, output sinks.
//!
//! Bad-channel self-correction is a bounded loop, not recursion.  A first
//! pass running with the `Auto` sentinel that detects bad channels restarts
//! once with those channels as an explicit list; because the derived config
//! no longer carries the sentinel, a second restart is impossible by
//! construction.

use std::path::Path;

use tracing::{info, warn};

use crate::config::{BadChannelSpec, PipelineConfig};
use crate::epochs::Epochs;
use crate::errors::Result;
use crate::evoked::{self, Evoked};
use crate::table::DataTable;
use crate::{detect, events, filter, io, logfile, montage, ocular, overrides, reference, resample, trials};
use crate::raw::RawRecording;

/// Everything one participant's run produces, plus the effective config.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Single-trial table: behavioral metadata + component amplitudes.
    pub trials: DataTable,
    /// Condition-averaged waveforms.
    pub evokeds: Vec<Evoked>,
    /// Long-form evoked summary table.
    pub evokeds_table: DataTable,
    /// The config the results were produced with.  When the run started
    /// from the `Auto` sentinel this holds the resolved explicit list, so
    /// re-running with the snapshot reproduces the result in one pass.
    pub config: PipelineConfig,
}

/// What one pass of the chain decided.
enum PassOutcome {
    Done(Box<PipelineOutput>),
    /// Auto detection found channels worth repairing; run again with them.
    Restart(Vec<String>),
}

/// Run the pipeline for one participant.
///
/// The participant id is the file stem of `raw_path` up to the first `.`.
pub fn run_participant(
    raw_path: &Path,
    log_path: &Path,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    let id = overrides::participant_id(raw_path);
    info!(participant = %id, "pipeline start");

    let mut cfg = config.clone();
    loop {
        match run_pass(raw_path, log_path, &id, &cfg)? {
            PassOutcome::Done(output) => {
                info!(participant = %id, "pipeline done");
                return Ok(*output);
            }
            PassOutcome::Restart(channels) => {
                warn!(
                    participant = %id,
                    bad_channels = ?channels,
                    "bad channels detected, restarting with explicit list"
                );
                // The derived copy holds a concrete `List`, so the next
                // pass cannot ask for another restart.
                cfg = cfg.with_bad_channels(channels);
            }
        }
    }
}

fn run_pass(
    raw_path: &Path,
    log_path: &Path,
    id: &str,
    cfg: &PipelineConfig,
) -> Result<PassOutcome> {
    let mut raw = RawRecording::load(raw_path)?;

    if let Some(target) = cfg.downsample_sfreq {
        resample::downsample(&mut raw, target)?;
    }
    ocular::add_heog_veog(&mut raw, &cfg.veog_channels, &cfg.heog_channels)?;
    montage::apply(&mut raw, &cfg.montage)?;

    if let BadChannelSpec::List(names) = &cfg.bad_channels {
        if !names.is_empty() {
            raw.mark_bads(names)?;
            montage::interpolate_bads(&mut raw)?;
        }
    }

    reference::average_reference_inplace(&mut raw);
    ocular::correct(&mut raw, &cfg.ocular_correction)?;
    filter::band_pass_inplace(&mut raw, cfg.highpass_freq, cfg.lowpass_freq)?;

    if let Some(dir) = &cfg.clean_dir {
        io::save_clean(&raw, dir, id)?;
    }

    let events = events::resolve_events(&raw, cfg.triggers.as_deref())?;
    let mut epochs = Epochs::extract(
        &raw,
        &events,
        cfg.epochs_tmin,
        cfg.epochs_tmax,
        cfg.baseline,
    )?;
    epochs.crop_excluding_tmax();

    let log = logfile::read_log(log_path, &cfg.skip_log_rows, &cfg.skip_log_conditions)?;
    let mut trial_table = trials::fuse_metadata(log, id, &epochs)?;

    let bads = detect::get_bads(&epochs, cfg.reject_peak_to_peak, cfg.reject_flat);
    if cfg.bad_channels.is_auto() && !bads.auto_channels.is_empty() {
        return Ok(PassOutcome::Restart(bads.auto_channels));
    }

    trials::compute_single_trials(
        &epochs,
        &cfg.components,
        &bads.bad_epoch_ixs,
        &mut trial_table,
    )?;

    // Effective snapshot: a clean first pass under `Auto` resolves to the
    // empty explicit list.
    let effective = if cfg.bad_channels.is_auto() {
        cfg.with_bad_channels(vec![])
    } else {
        cfg.clone()
    };

    if let Some(dir) = &cfg.epochs_dir {
        io::save_epochs(&epochs, &trial_table, dir, id, cfg.to_df)?;
    }
    if let Some(dir) = &cfg.trials_dir {
        io::save_df(&trial_table, dir, id, "trials")?;
    }

    let (evokeds, evokeds_table) = evoked::compute_evokeds(
        &epochs,
        &trial_table,
        effective.condition_cols.as_deref(),
        &bads.bad_epoch_ixs,
        id,
    )?;
    if let Some(dir) = &cfg.evokeds_dir {
        io::save_evokeds(&evokeds, &evokeds_table, dir, id, cfg.to_df)?;
    }

    if let Some(dir) = &cfg.export_dir {
        io::save_montage(&raw, dir)?;
        io::save_config(&effective, dir)?;
    }

    Ok(PassOutcome::Done(Box::new(PipelineOutput {
        trials: trial_table,
        evokeds,
        evokeds_table,
        config: effective,
    })))
}
