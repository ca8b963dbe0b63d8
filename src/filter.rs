//! FIR band-pass filter design and zero-phase application.
//!
//! Design: Hamming-windowed sinc, built as the difference of two unit-gain
//! lowpass kernels (upper cutoff minus lower cutoff).  Transition bandwidth
//! and tap count follow the usual windowed-design rules
//! (`min(max(0.25·f, 2), f)` and `ceil(3.3 / trans_bw · sfreq)` rounded to
//! odd).
//!
//! Application: overlap-add FFT convolution with the output shifted left by
//! `(N-1)/2` samples for zero phase; edge transients are suppressed by
//! reflect-limited padding.

use std::f64::consts::PI;

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::errors::Result;
use crate::raw::RawRecording;

/// Band-pass the whole recording in place.
pub fn band_pass_inplace(raw: &mut RawRecording, l_freq: f64, h_freq: f64) -> Result<()> {
    let h = design_bandpass(l_freq, h_freq, raw.sfreq);
    apply_fir_zero_phase(&mut raw.data, &h)
}

/// Transition bandwidth for a filter edge at `freq` Hz:
/// `min(max(0.25 · freq, 2.0), freq)`.
pub fn auto_trans_bandwidth(freq: f64) -> f64 {
    (0.25 * freq).max(2.0).min(freq)
}

/// Tap count for a given transition bandwidth, rounded up to odd
/// (odd length is required for a zero-phase linear-phase FIR).
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Design a zero-phase band-pass FIR with cutoffs `l_freq`..`h_freq`.
///
/// The kernel length is driven by the narrower transition band (in
/// practice the low edge, e.g. 0.1 Hz), so one length serves both edges.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let tb_low = auto_trans_bandwidth(l_freq);
    let tb_high = auto_trans_bandwidth(h_freq);
    let n = auto_filter_length(tb_low.min(tb_high), sfreq);

    // Cutoffs at the midpoint of each transition band.
    let cutoff_low = (l_freq + (l_freq - tb_low).max(0.0)) / 2.0;
    let cutoff_high = (h_freq + (h_freq + tb_high).min(sfreq / 2.0)) / 2.0;

    let lp_high = firwin_lowpass(n, cutoff_high, sfreq);
    let lp_low = firwin_lowpass(n, cutoff_low.max(1e-4), sfreq);
    lp_high
        .iter()
        .zip(&lp_low)
        .map(|(&hi, &lo)| hi - lo)
        .collect()
}

/// Hamming-windowed sinc lowpass with unit DC gain.  `n` must be odd.
pub fn firwin_lowpass(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    assert!(n % 2 == 1, "linear-phase FIR needs odd N");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0); // normalised [0, 1]
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Apply a zero-phase FIR to each row of `data` (`[C, T]`) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    for ch in 0..data.nrows() {
        let row: Vec<f64> = data.row(ch).to_vec();
        let filtered = filter_1d(&row, h)?;
        data.row_mut(ch)
            .assign(&ndarray::ArrayView1::from(&filtered));
    }
    Ok(())
}

/// Overlap-add convolution of one channel; output length equals input
/// length.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    let n_x = x.len();
    let n_h = h.len();
    if n_x == 0 {
        return Ok(vec![]);
    }

    let shift = (n_h - 1) / 2; // zero-phase shift, N odd
    let n_edge = n_h - 1;

    let x_ext = reflect_limited_pad(x, n_edge, n_edge);
    let n_ext = x_ext.len();
    let n_fft = choose_fft_len(n_h, n_ext);
    let h_fft = fft_of(h, n_fft);

    let n_seg = n_fft - n_h + 1;
    let n_segments = n_ext.div_ceil(n_seg);
    let mut filtered = vec![0.0; n_ext];

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fwd = planner.plan_fft_forward(n_fft);
    let inv = planner.plan_fft_inverse(n_fft);
    let inv_scale = 1.0 / n_fft as f64;

    for seg in 0..n_segments {
        let start = seg * n_seg;
        let stop = (start + n_seg).min(n_ext);

        let mut buf: Vec<Complex<f64>> = x_ext[start..stop]
            .iter()
            .map(|&v| Complex { re: v, im: 0.0 })
            .chain(std::iter::repeat(Complex::default()))
            .take(n_fft)
            .collect();
        fwd.process(&mut buf);
        for (b, &hf) in buf.iter_mut().zip(&h_fft) {
            *b *= hf;
        }
        inv.process(&mut buf);

        let out_start = start.saturating_sub(shift);
        let out_end = (out_start + n_fft).min(n_ext);
        let prod_start = shift.saturating_sub(start);
        for (o, p) in (out_start..out_end).zip(prod_start..) {
            if p < buf.len() {
                filtered[o] += buf[p].re * inv_scale;
            }
        }
    }

    Ok(filtered[n_edge..n_edge + n_x].to_vec())
}

/// Reflect-limited padding: odd reflection around the edge samples, zeros
/// beyond the signal length.
fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.resize(n_l - actual_l, 0.0);
    for i in (1..=actual_l).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend_from_slice(x);
    let last = x[n - 1];
    for i in 1..=actual_r {
        out.push(2.0 * last - x[(n - 1).saturating_sub(i)]);
    }
    out.resize(out.len() + (n_r - actual_r), 0.0);
    out
}

/// Power-of-two FFT block size minimising the overlap-add operation count.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let max_pow = (n_x as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1usize << max_pow;
    let mut best_cost = f64::INFINITY;
    for pow in min_pow..=max_pow {
        let n = 1usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost =
            (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0) + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}

fn fft_of(h: &[f64], n_fft: usize) -> Vec<Complex<f64>> {
    let mut buf: Vec<Complex<f64>> = h
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n_fft)
        .collect();
    FftPlanner::new().plan_fft_forward(n_fft).process(&mut buf);
    buf
}
