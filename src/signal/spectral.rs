use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{CleanError, Result};

/// One-sided power spectral density estimate with a boxcar window.
///
/// Each series is mean-removed; series longer than `nfft` are truncated to
/// `nfft` samples and shorter ones are zero padded. Density scaling:
/// `|X_k|² / (fs · n)`, doubled for every bin except DC and (for even `nfft`)
/// Nyquist.
pub struct Periodogram {
    nfft: usize,
    fs: f64,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl Periodogram {
    pub fn new(nfft: usize, fs: f64) -> Result<Self> {
        if nfft < 2 {
            return Err(CleanError::config(format!("nfft must be at least 2, got {nfft}")));
        }
        if !(fs.is_finite() && fs > 0.0) {
            return Err(CleanError::config(format!("invalid sampling rate {fs} Hz")));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(nfft);
        Ok(Self {
            nfft,
            fs,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); nfft],
        })
    }

    /// Number of one-sided bins, `nfft / 2 + 1`.
    pub fn n_bins(&self) -> usize {
        self.nfft / 2 + 1
    }

    /// Bin spacing in Hz.
    pub fn resolution(&self) -> f64 {
        self.fs / self.nfft as f64
    }

    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.n_bins()).map(|k| k as f64 * self.resolution()).collect()
    }

    /// Power spectral density of `series`, one value per bin.
    pub fn estimate(&mut self, series: &[f64]) -> Vec<f64> {
        let n = series.len().min(self.nfft);
        let mut psd = vec![0.0; self.n_bins()];
        if n == 0 {
            return psd;
        }

        let segment = &series[..n];
        let mean = segment.iter().sum::<f64>() / n as f64;
        for (slot, i) in self.buffer.iter_mut().zip(0..) {
            let re = if i < n { segment[i] - mean } else { 0.0 };
            *slot = Complex::new(re, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / (self.fs * n as f64);
        let last = self.n_bins() - 1;
        let nyquist_bin = self.nfft % 2 == 0;
        for (k, p) in psd.iter_mut().enumerate() {
            let mut v = self.buffer[k].norm_sqr() * scale;
            if k != 0 && !(nyquist_bin && k == last) {
                v *= 2.0;
            }
            *p = v;
        }
        psd
    }
}
