//! Safetensors I/O and the pipeline's output sinks.
//!
//! The reader parses recordings exported as safetensors; the sinks write
//! cleaned data, epochs, trial tables, evokeds, channel locations and the
//! config snapshot, each gated on its output directory being configured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::config::{OutputFormat, PipelineConfig};
use crate::epochs::Epochs;
use crate::errors::{Error, Result};
use crate::evoked::Evoked;
use crate::raw::RawRecording;
use crate::table::{DataTable, Value};

// ── Low-level safetensors parser (no dependency on the `safetensors` crate's
//    tensor types — we just need raw bytes → ndarray). ─────────────────────────

/// A parsed safetensors file: header plus the shared byte buffer.
pub struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < 8 {
            return Err(Error::Format("safetensors file too small".into()));
        }
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        if bytes.len() < 8 + n {
            return Err(Error::Format("safetensors header truncated".into()));
        }
        let header: HashMap<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..8 + n])
                .map_err(|e| Error::Format(format!("safetensors header: {e}")))?;
        Ok(Self { bytes, header, data_start: 8 + n })
    }

    pub fn has(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<&serde_json::Value> {
        self.header
            .get(name)
            .ok_or_else(|| Error::Format(format!("missing tensor {name:?}")))
    }

    fn raw_bytes(&self, entry: &serde_json::Value, name: &str) -> Result<&[u8]> {
        let offsets = entry["data_offsets"]
            .as_array()
            .ok_or_else(|| Error::Format(format!("tensor {name:?} has no offsets")))?;
        let s = offsets[0].as_u64().unwrap_or(0) as usize;
        let e = offsets[1].as_u64().unwrap_or(0) as usize;
        self.bytes
            .get(self.data_start + s..self.data_start + e)
            .ok_or_else(|| Error::Format(format!("tensor {name:?} out of bounds")))
    }

    fn shape_of(entry: &serde_json::Value, name: &str) -> Result<Vec<usize>> {
        Ok(entry["shape"]
            .as_array()
            .ok_or_else(|| Error::Format(format!("tensor {name:?} has no shape")))?
            .iter()
            .filter_map(|v| v.as_u64())
            .map(|v| v as usize)
            .collect())
    }

    /// Numeric tensor as a flat `f64` vector; `F32` and `F64` are accepted.
    fn numbers(&self, name: &str) -> Result<Vec<f64>> {
        let entry = self.entry(name)?;
        let raw = self.raw_bytes(entry, name)?;
        match entry["dtype"].as_str() {
            Some("F64") => Ok(raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
                .collect()),
            Some("F32") => Ok(raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes(b.try_into().unwrap()) as f64)
                .collect()),
            other => Err(Error::Format(format!(
                "tensor {name:?} has unsupported dtype {other:?}"
            ))),
        }
    }

    pub fn tensor_1d(&self, name: &str) -> Result<Vec<f64>> {
        self.numbers(name)
    }

    pub fn tensor_2d(&self, name: &str) -> Result<Array2<f64>> {
        let entry = self.entry(name)?;
        let shape = Self::shape_of(entry, name)?;
        if shape.len() != 2 {
            return Err(Error::Format(format!(
                "tensor {name:?} has rank {}, expected 2",
                shape.len()
            )));
        }
        let data = self.numbers(name)?;
        Ok(Array2::from_shape_vec((shape[0], shape[1]), data)?)
    }

    /// Newline-joined UTF-8 string tensor.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let entry = self.entry(name)?;
        let raw = self.raw_bytes(entry, name)?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::Format(format!("tensor {name:?} is not UTF-8: {e}")))?;
        Ok(text
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Safetensors file writer handling F64, I32 and string tensors.
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl Default for StWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Store strings as one newline-joined UTF-8 tensor.
    pub fn add_strings(&mut self, name: &str, items: &[String]) {
        let bytes = items.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)
            .map_err(|e| Error::Format(e.to_string()))?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Output sinks ──────────────────────────────────────────────────────────────

fn prepare(dir: &Path, file: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.join(file))
}

/// Write the cleaned continuous recording so [`RawRecording::load`] can read
/// it back: `{id}_cleaned_eeg.safetensors`.
pub fn save_clean(raw: &RawRecording, dir: &Path, participant_id: &str) -> Result<()> {
    let path = prepare(dir, &format!("{participant_id}_cleaned_eeg.safetensors"))?;
    let mut w = StWriter::new();
    w.add_f64_arr2("data", &raw.data);
    w.add_f64("sfreq", &[raw.sfreq], &[1]);
    let names: Vec<String> = raw.channels.iter().map(|c| c.name.clone()).collect();
    w.add_strings("ch_names", &names);
    if raw.channels.iter().all(|c| c.pos.is_some()) {
        let flat: Vec<f64> = raw
            .channels
            .iter()
            .flat_map(|c| c.pos.unwrap_or_default())
            .collect();
        w.add_f64("chan_pos", &flat, &[raw.n_channels(), 3]);
    }
    if !raw.annotations.is_empty() {
        let onsets: Vec<f64> = raw.annotations.iter().map(|a| a.onset).collect();
        let labels: Vec<String> =
            raw.annotations.iter().map(|a| a.description.clone()).collect();
        w.add_f64("marker_onsets", &onsets, &[onsets.len()]);
        w.add_strings("marker_labels", &labels);
    }
    w.write(&path)?;
    info!(path = %path.display(), "cleaned data saved");
    Ok(())
}

/// Write a table as `{id}_{suffix}.csv`.
pub fn save_df(table: &DataTable, dir: &Path, participant_id: &str, suffix: &str) -> Result<()> {
    let path = prepare(dir, &format!("{participant_id}_{suffix}.csv"))?;
    table.write_csv(&path)?;
    info!(path = %path.display(), "table saved");
    Ok(())
}

/// Write the epoched data as `{id}_epo.*`.
///
/// The tabular form is one row per epoch × sample: the trial metadata
/// repeated for every sample, a `time` column, then one column per channel.
/// The native form keeps the `[E, C, T]` tensor with its event codes.
pub fn save_epochs(
    epochs: &Epochs,
    trials: &DataTable,
    dir: &Path,
    participant_id: &str,
    format: OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Tabular | OutputFormat::Both) {
        let path = prepare(dir, &format!("{participant_id}_epo.csv"))?;
        let mut columns: Vec<String> = trials.columns().to_vec();
        columns.push("time".into());
        columns.extend(epochs.channels.iter().map(|c| c.name.clone()));
        let mut long = DataTable::new(columns);
        let times = epochs.times();
        for e in 0..epochs.n_epochs() {
            for (t_ix, &t) in times.iter().enumerate() {
                let mut row: Vec<Value> = trials.rows()[e].clone();
                row.push(Value::Float(t));
                row.extend(
                    (0..epochs.n_channels()).map(|c| Value::Float(epochs.data[[e, c, t_ix]])),
                );
                long.push_row(row)?;
            }
        }
        long.write_csv(&path)?;
        info!(path = %path.display(), "epochs saved");
    }
    if matches!(format, OutputFormat::Native | OutputFormat::Both) {
        let path = prepare(dir, &format!("{participant_id}_epo.safetensors"))?;
        let (n_e, n_c, n_t) = epochs.data.dim();
        let flat: Vec<f64> = epochs.data.iter().copied().collect();
        let mut w = StWriter::new();
        w.add_f64("data", &flat, &[n_e, n_c, n_t]);
        w.add_f64("sfreq", &[epochs.sfreq], &[1]);
        w.add_f64("tmin", &[epochs.tmin], &[1]);
        let onsets: Vec<f64> = epochs.events.iter().map(|e| e.onset_sample as f64).collect();
        let codes: Vec<i32> = epochs.events.iter().map(|e| e.code).collect();
        w.add_f64("event_onsets", &onsets, &[n_e]);
        w.add_i32("event_codes", &codes, &[n_e]);
        let names: Vec<String> = epochs.channels.iter().map(|c| c.name.clone()).collect();
        w.add_strings("ch_names", &names);
        w.write(&path)?;
        info!(path = %path.display(), "epochs saved");
    }
    Ok(())
}

/// Write the evokeds as `{id}_ave.*`.
pub fn save_evokeds(
    evokeds: &[Evoked],
    summary: &DataTable,
    dir: &Path,
    participant_id: &str,
    format: OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Tabular | OutputFormat::Both) {
        let path = prepare(dir, &format!("{participant_id}_ave.csv"))?;
        summary.write_csv(&path)?;
        info!(path = %path.display(), "evokeds saved");
    }
    if matches!(format, OutputFormat::Native | OutputFormat::Both) {
        let path = prepare(dir, &format!("{participant_id}_ave.safetensors"))?;
        let mut w = StWriter::new();
        for (i, evoked) in evokeds.iter().enumerate() {
            w.add_f64_arr2(&format!("evoked_{i}"), &evoked.data);
        }
        let comments: Vec<String> = evokeds.iter().map(|e| e.comment.clone()).collect();
        w.add_strings("comments", &comments);
        let naves: Vec<i32> = evokeds.iter().map(|e| e.nave as i32).collect();
        w.add_i32("nave", &naves, &[naves.len()]);
        if let Some(first) = evokeds.first() {
            w.add_f64("times", &first.times, &[first.times.len()]);
        }
        w.write(&path)?;
        info!(path = %path.display(), "evokeds saved");
    }
    Ok(())
}

/// Write the channel locations as `channel_locations.csv`
/// (`ch_name,x,y,z`, positioned channels only).
pub fn save_montage(raw: &RawRecording, dir: &Path) -> Result<()> {
    let path = prepare(dir, "channel_locations.csv")?;
    let mut table = DataTable::new(
        ["ch_name", "x", "y", "z"].iter().map(|s| s.to_string()).collect(),
    );
    for ch in &raw.channels {
        if let Some([x, y, z]) = ch.pos {
            table.push_row(vec![
                Value::Str(ch.name.clone()),
                Value::Float(x),
                Value::Float(y),
                Value::Float(z),
            ])?;
        }
    }
    table.write_csv(&path)?;
    info!(path = %path.display(), "channel locations saved");
    Ok(())
}

/// Write the effective config snapshot as `config.json`.
pub fn save_config(config: &PipelineConfig, dir: &Path) -> Result<()> {
    let path = prepare(dir, "config.json")?;
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Format(e.to_string()))?;
    std::fs::write(&path, json)?;
    info!(path = %path.display(), "config snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{Annotation, ChannelKind};

    fn toy_raw() -> RawRecording {
        let data = Array2::from_shape_fn((2, 50), |(c, t)| c as f64 * 10.0 + t as f64);
        let mut raw = RawRecording::new(data, 250.0, &["Fz", "Cz"]);
        raw.annotations = vec![
            Annotation { onset: 0.1, description: "Stimulus/S 11".into() },
            Annotation { onset: 0.15, description: "Stimulus/S 12".into() },
        ];
        raw
    }

    #[test]
    fn clean_data_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let raw = toy_raw();
        save_clean(&raw, dir.path(), "S01").unwrap();
        let back =
            RawRecording::load(&dir.path().join("S01_cleaned_eeg.safetensors")).unwrap();
        assert_eq!(back.n_channels(), 2);
        assert_eq!(back.n_samples(), 50);
        assert_eq!(back.channels[1].name, "Cz");
        assert_eq!(back.annotations, raw.annotations);
        approx::assert_abs_diff_eq!(back.data[[1, 3]], 13.0, epsilon = 1e-12);
    }

    #[test]
    fn positions_survive_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = toy_raw();
        raw.channels[0].pos = Some([0.0, 0.08, 0.04]);
        raw.channels[1].pos = Some([0.0, 0.0, 0.095]);
        save_clean(&raw, dir.path(), "S01").unwrap();
        let back =
            RawRecording::load(&dir.path().join("S01_cleaned_eeg.safetensors")).unwrap();
        assert_eq!(back.channels[1].pos, Some([0.0, 0.0, 0.095]));
    }

    #[test]
    fn f32_tensors_are_widened_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.safetensors");
        let mut w = StWriter::new();
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        w.entries.push(("x".into(), bytes, "F32", vec![2]));
        w.write(&path).unwrap();
        let f = StFile::open(&path).unwrap();
        assert_eq!(f.tensor_1d("x").unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn missing_tensor_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.safetensors");
        StWriter::new().write(&path).unwrap();
        let f = StFile::open(&path).unwrap();
        assert!(!f.has("data"));
        assert!(matches!(f.tensor_2d("data"), Err(Error::Format(_))));
    }

    #[test]
    fn montage_sink_skips_unpositioned_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = toy_raw();
        raw.channels[0].pos = Some([0.0, 0.08, 0.04]);
        raw.channels[1].kind = ChannelKind::Eog;
        save_montage(&raw, dir.path()).unwrap();
        let back = DataTable::from_csv(&dir.path().join("channel_locations.csv")).unwrap();
        assert_eq!(back.n_rows(), 1);
        assert_eq!(back.get(0, "ch_name"), Some(&Value::Str("Fz".into())));
    }

    #[test]
    fn config_snapshot_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::default();
        save_config(&cfg, dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        let back: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
