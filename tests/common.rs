/// Shared fixture builders for the integration tests.
use std::f64::consts::PI;
use std::io::Write;
use std::path::{Path, PathBuf};

use erppipe::{Component, PipelineConfig, StWriter};

pub const SFREQ: f64 = 200.0;
pub const DURATION_S: f64 = 44.0;
pub const N_EVENTS: usize = 21;

/// Scalp channels: VEOG pair (Fp1/IO1), HEOG pair (F9/F10), four cap sites.
pub const CHANNELS: &[&str] = &["Fp1", "IO1", "F9", "F10", "Fz", "Cz", "Pz", "Oz"];

/// Write a synthetic recording: one distinct sinusoid per channel (6 Hz,
/// 7 Hz, ...) and alternating stimulus markers every 2 s.  `noisy` picks a
/// channel whose amplitude is raised far above the rejection threshold.
#[allow(unused)]
pub fn write_recording(dir: &Path, id: &str, noisy: Option<&str>) -> PathBuf {
    let n_t = (SFREQ * DURATION_S) as usize;
    let n_c = CHANNELS.len();
    let mut data = vec![0.0f64; n_c * n_t];
    for (c, name) in CHANNELS.iter().enumerate() {
        let amp = if Some(*name) == noisy { 300.0 } else { 20.0 };
        let freq = 6.0 + c as f64;
        for t in 0..n_t {
            data[c * n_t + t] =
                amp * (2.0 * PI * freq * t as f64 / SFREQ + c as f64).sin();
        }
    }

    let mut onsets = Vec::with_capacity(N_EVENTS);
    let mut labels = Vec::with_capacity(N_EVENTS);
    for i in 0..N_EVENTS {
        onsets.push(2.0 + 2.0 * i as f64);
        labels.push(
            if i % 2 == 0 { "Stimulus/S 11" } else { "Stimulus/S 12" }.to_string(),
        );
    }

    let names: Vec<String> = CHANNELS.iter().map(|s| s.to_string()).collect();
    let path = dir.join(format!("{id}.safetensors"));
    let mut w = StWriter::new();
    w.add_f64("data", &data, &[n_c, n_t]);
    w.add_f64("sfreq", &[SFREQ], &[1]);
    w.add_strings("ch_names", &names);
    w.add_f64("marker_onsets", &onsets, &[onsets.len()]);
    w.add_strings("marker_labels", &labels);
    w.write(&path).unwrap();
    path
}

/// Write a behavioral log whose rows mirror the marker alternation.  With
/// `with_fillers`, two extra `filler` rows are inserted that must be
/// dropped via `skip_log_conditions` to restore the 1:1 alignment.
#[allow(unused)]
pub fn write_log(dir: &Path, id: &str, with_fillers: bool) -> PathBuf {
    let path = dir.join(format!("{id}.csv"));
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "condition,rt").unwrap();
    for i in 0..N_EVENTS {
        if with_fillers && (i == 0 || i == 12) {
            writeln!(f, "filler,0.9990").unwrap();
        }
        let condition = if i % 2 == 0 { "related" } else { "unrelated" };
        writeln!(f, "{condition},{:.4}", 0.4 + 0.01 * i as f64).unwrap();
    }
    path
}

/// Config tuned for the synthetic data: 1 Hz high-pass keeps the FIR
/// kernel short, one component over Cz/Pz, grouping by `condition`.
#[allow(unused)]
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        highpass_freq: 1.0,
        lowpass_freq: 30.0,
        components: vec![Component {
            name: "N400".into(),
            tmin: 0.3,
            tmax: 0.5,
            roi: vec!["Cz".into(), "Pz".into()],
        }],
        condition_cols: Some(vec!["condition".into()]),
        ..PipelineConfig::default()
    }
}
