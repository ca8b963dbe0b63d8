//! FFT-based rational resampler.
//!
//! Per channel: reflect-limited padding to the next power of two, forward
//! FFT, Nyquist-bin adjustment, spectral truncation (down) or zero-padding
//! (up), inverse FFT, strip the resampled padding.  Annotation onsets are
//! stored in seconds and therefore need no adjustment; only the recording's
//! `sfreq` changes.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::info;

use crate::errors::Result;
use crate::raw::RawRecording;

/// Resample the recording in place to `target_sfreq`.
///
/// Skipped (with no copy) when the rate already matches within 1 mHz.
pub fn downsample(raw: &mut RawRecording, target_sfreq: f64) -> Result<()> {
    if (raw.sfreq - target_sfreq).abs() < 1e-3 {
        return Ok(());
    }
    info!(from = raw.sfreq, to = target_sfreq, "downsampling");
    raw.data = resample(&raw.data, raw.sfreq, target_sfreq)?;
    raw.sfreq = target_sfreq;
    Ok(())
}

/// Resample `data` (`[C, T]`) from `src_sfreq` to `dst_sfreq`.
pub fn resample(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(data.clone());
    }
    let ratio = dst_sfreq / src_sfreq;
    let n_in = data.ncols();
    let final_len = (ratio * n_in as f64).round() as usize;
    let (npad_l, npad_r) = auto_npad(n_in);

    let mut out = Array2::zeros((data.nrows(), final_len));
    for (ch, row) in data.rows().into_iter().enumerate() {
        let row: Vec<f64> = row.to_vec();
        let resampled = resample_1d(&row, ratio, npad_l, npad_r)?;
        out.row_mut(ch)
            .assign(&ndarray::ArrayView1::from(&resampled));
    }
    Ok(out)
}

/// Padding that brings the signal to the next power of two:
/// `min(n/8, 100) * 2` extra samples, split across both sides.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let next_pow2 = 1usize << (((n + min_add) as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Resample one channel with explicit (possibly asymmetric) padding.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Result<Vec<f64>> {
    let n_in = x.len();
    if n_in == 0 {
        return Ok(vec![]);
    }
    let final_len = (ratio * n_in as f64).round() as usize;

    // Reflect-limited padding; pads beyond n-1 samples are clamped.
    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let old_len = n_in + pad_l + pad_r;

    let mut x_ext = Vec::with_capacity(old_len);
    for i in (1..=pad_l).rev() {
        x_ext.push(2.0 * x[0] - x[i]);
    }
    x_ext.extend_from_slice(x);
    let last = x[n_in - 1];
    for i in 1..=pad_r {
        x_ext.push(2.0 * last - x[(n_in - 1).saturating_sub(i)]);
    }

    let new_len_padded = (ratio * old_len as f64).round() as usize;
    let shorter = new_len_padded < old_len;
    let use_len = if shorter { new_len_padded } else { old_len };

    // Forward FFT, keep the half-spectrum.
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(old_len);
    let mut buf: Vec<Complex<f64>> = x_ext
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .collect();
    fft.process(&mut buf);
    let mut half: Vec<Complex<f64>> = buf[..old_len / 2 + 1].to_vec();

    // Nyquist bin: doubled when truncating, halved when extending.
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < half.len() {
            half[nyq] *= if shorter { 2.0 } else { 0.5 };
        }
    }

    let scale = new_len_padded as f64 / old_len as f64;
    for v in &mut half {
        *v *= scale;
    }

    // Inverse FFT at the new length: truncates or zero-pads the spectrum.
    let new_half_len = new_len_padded / 2 + 1;
    let mut spectrum = vec![Complex::<f64>::default(); new_len_padded];
    let n_copy = half.len().min(new_half_len);
    spectrum[..n_copy].copy_from_slice(&half[..n_copy]);
    for i in 1..new_half_len {
        let mirror = new_len_padded - i;
        if mirror >= new_half_len {
            spectrum[mirror] = spectrum[i].conj();
        }
    }
    let ifft = planner.plan_fft_inverse(new_len_padded);
    ifft.process(&mut spectrum);
    let inv_scale = 1.0 / new_len_padded as f64;

    // Strip the resampled padding.
    let strip_l = (ratio * npad_l as f64).round() as usize;
    let strip_r = new_len_padded - final_len - strip_l;
    let end = new_len_padded.saturating_sub(strip_r);
    let mut result: Vec<f64> = spectrum[strip_l..end].iter().map(|c| c.re * inv_scale).collect();
    result.resize(final_len, 0.0);
    Ok(result)
}
