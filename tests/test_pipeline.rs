//! End-to-end runs of the participant pipeline on synthetic recordings.

mod common;

use common::{test_config, write_log, write_recording, N_EVENTS};
use erppipe::{run_participant, BadChannelSpec, Error, OutputFormat, Value};

#[test]
fn clean_run_resolves_auto_to_the_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S01", None);
    let log = write_log(dir.path(), "S01", false);

    let out = run_participant(&raw, &log, &test_config()).unwrap();

    assert_eq!(out.trials.n_rows(), N_EVENTS);
    assert_eq!(out.trials.columns()[0], "participant_id");
    assert_eq!(out.trials.get(0, "participant_id"), Some(&Value::Str("S01".into())));
    assert!(out.trials.column_index("N400").is_some());
    // No channels were detected, so the snapshot holds the empty list.
    assert_eq!(out.config.bad_channels, BadChannelSpec::List(vec![]));
}

#[test]
fn noisy_channel_restarts_once_with_the_detected_list() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S02", Some("Pz"));
    let log = write_log(dir.path(), "S02", false);

    let out = run_participant(&raw, &log, &test_config()).unwrap();

    // The snapshot proves the second pass ran with the explicit list.
    assert_eq!(
        out.config.bad_channels,
        BadChannelSpec::List(vec!["Pz".to_string()])
    );
    // After interpolation the repaired run keeps every trial.
    assert_eq!(out.trials.n_rows(), N_EVENTS);
    assert!(!out.evokeds.is_empty());
}

#[test]
fn explicit_list_skips_detection_restart() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S03", Some("Pz"));
    let log = write_log(dir.path(), "S03", false);

    let cfg = test_config().with_bad_channels(vec!["Pz".to_string()]);
    let out = run_participant(&raw, &log, &cfg).unwrap();

    assert_eq!(
        out.config.bad_channels,
        BadChannelSpec::List(vec!["Pz".to_string()])
    );
    assert_eq!(out.trials.n_rows(), N_EVENTS);
}

#[test]
fn evokeds_group_by_condition_in_first_appearance_order() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S04", None);
    let log = write_log(dir.path(), "S04", false);

    let out = run_participant(&raw, &log, &test_config()).unwrap();

    let comments: Vec<&str> = out.evokeds.iter().map(|e| e.comment.as_str()).collect();
    assert_eq!(comments, vec!["related", "unrelated"]);
    assert_eq!(out.evokeds[0].nave + out.evokeds[1].nave, N_EVENTS);
    // Long-form summary: one row per evoked × sample.
    let n_times = out.evokeds[0].times.len();
    assert_eq!(out.evokeds_table.n_rows(), 2 * n_times);
}

#[test]
fn epoch_length_is_exclusive_of_tmax() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S05", None);
    let log = write_log(dir.path(), "S05", false);

    let out = run_participant(&raw, &log, &test_config()).unwrap();
    // [-0.5, 1.5) at 200 Hz: exactly 400 samples, the sample at tmax dropped.
    assert_eq!(out.evokeds[0].times.len(), 400);
}

#[test]
fn downsampling_shrinks_the_epoch_grid() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S06", None);
    let log = write_log(dir.path(), "S06", false);

    let mut cfg = test_config();
    cfg.downsample_sfreq = Some(100.0);
    let out = run_participant(&raw, &log, &cfg).unwrap();

    assert_eq!(out.evokeds[0].times.len(), 200);
    assert_eq!(out.trials.n_rows(), N_EVENTS);
}

#[test]
fn filler_rows_break_alignment_unless_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S07", None);
    let log = write_log(dir.path(), "S07", true);

    // 23 log rows for 21 epochs: a configuration error.
    let err = run_participant(&raw, &log, &test_config());
    assert!(matches!(err, Err(Error::Config(_))));

    let mut cfg = test_config();
    cfg.skip_log_conditions =
        vec![("condition".to_string(), vec!["filler".to_string()])];
    let out = run_participant(&raw, &log, &cfg).unwrap();
    assert_eq!(out.trials.n_rows(), N_EVENTS);
}

#[test]
fn configured_sinks_write_their_files() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S08", None);
    let log = write_log(dir.path(), "S08", false);

    let out_dir = dir.path().join("derivatives");
    let mut cfg = test_config();
    cfg.clean_dir = Some(out_dir.join("clean"));
    cfg.epochs_dir = Some(out_dir.join("epochs"));
    cfg.trials_dir = Some(out_dir.join("trials"));
    cfg.evokeds_dir = Some(out_dir.join("evokeds"));
    cfg.export_dir = Some(out_dir.join("export"));
    cfg.to_df = OutputFormat::Both;

    run_participant(&raw, &log, &cfg).unwrap();

    for file in [
        "clean/S08_cleaned_eeg.safetensors",
        "epochs/S08_epo.csv",
        "epochs/S08_epo.safetensors",
        "trials/S08_trials.csv",
        "evokeds/S08_ave.csv",
        "evokeds/S08_ave.safetensors",
        "export/channel_locations.csv",
        "export/config.json",
    ] {
        assert!(out_dir.join(file).exists(), "missing {file}");
    }
}

#[test]
fn single_trial_amplitudes_are_numeric_on_a_clean_run() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_recording(dir.path(), "S09", None);
    let log = write_log(dir.path(), "S09", false);

    let out = run_participant(&raw, &log, &test_config()).unwrap();
    for e in 0..out.trials.n_rows() {
        assert!(
            matches!(out.trials.get(e, "N400"), Some(Value::Float(_))),
            "trial {e} has no amplitude"
        );
    }
}
