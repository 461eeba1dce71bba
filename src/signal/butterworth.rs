//! Zero-phase Butterworth filtering built from `biquad` sections.
use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};
use log::debug;

use crate::error::{CleanError, Result};

/// Pass band of a temporal filter, cutoffs in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    LowPass(f64),
    HighPass(f64),
    /// High-pass at `high_pass` followed by low-pass at `low_pass`.
    BandPass { high_pass: f64, low_pass: f64 },
}

impl Band {
    /// Band implied by optional cutoffs; `None` when neither is set.
    pub fn from_cutoffs(low_pass: Option<f64>, high_pass: Option<f64>) -> Option<Band> {
        match (low_pass, high_pass) {
            (Some(low_pass), Some(high_pass)) => Some(Band::BandPass { high_pass, low_pass }),
            (Some(lp), None) => Some(Band::LowPass(lp)),
            (None, Some(hp)) => Some(Band::HighPass(hp)),
            (None, None) => None,
        }
    }
}

/// A cascade of second-order sections (plus one first-order section for odd
/// orders) per band edge, run forward and backward.
pub struct ButterworthFilter {
    sections: Vec<Coefficients<f64>>,
    order: usize,
}

impl ButterworthFilter {
    /// Design a filter of `order` per edge for data sampled at `fs` Hz.
    ///
    /// Every cutoff must lie strictly between 0 and the Nyquist frequency.
    pub fn new(band: Band, fs: f64, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(CleanError::config("filter order must be at least 1"));
        }
        if !(fs.is_finite() && fs > 0.0) {
            return Err(CleanError::config(format!("invalid sampling rate {fs} Hz")));
        }

        let mut sections = Vec::new();
        match band {
            Band::LowPass(f0) => {
                sections.extend(edge_sections(Edge::Low, fs, f0, order)?);
            }
            Band::HighPass(f0) => {
                sections.extend(edge_sections(Edge::High, fs, f0, order)?);
            }
            Band::BandPass { high_pass, low_pass } => {
                if high_pass >= low_pass {
                    return Err(CleanError::config(format!(
                        "high-pass cutoff {high_pass} Hz must be below low-pass cutoff {low_pass} Hz"
                    )));
                }
                sections.extend(edge_sections(Edge::High, fs, high_pass, order)?);
                sections.extend(edge_sections(Edge::Low, fs, low_pass, order)?);
            }
        }
        debug!("butterworth {band:?} at fs={fs} Hz: {} sections", sections.len());

        let total_order = match band {
            Band::BandPass { .. } => 2 * order,
            _ => order,
        };
        Ok(ButterworthFilter {
            sections,
            order: total_order,
        })
    }

    /// Filter for optional cutoffs and sampling interval `tr` (seconds).
    /// `Ok(None)` when no cutoff is set; an error when one is set without a
    /// usable `tr`.
    pub fn from_cutoffs(
        low_pass: Option<f64>,
        high_pass: Option<f64>,
        tr: Option<f64>,
        order: usize,
    ) -> Result<Option<Self>> {
        let Some(band) = Band::from_cutoffs(low_pass, high_pass) else {
            return Ok(None);
        };
        let tr = tr
            .filter(|t| t.is_finite() && *t > 0.0)
            .ok_or_else(|| CleanError::config("temporal filtering requires a positive TR"))?;
        Self::new(band, 1.0 / tr, order).map(Some)
    }

    /// Combined order of the cascade.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Zero-phase filtering in place (forward pass, then backward pass), with
    /// the ends extended by odd reflection to limit edge transients.
    pub fn filtfilt(&self, x: &mut [f64]) {
        let n = x.len();
        if n < 2 {
            return;
        }
        let padlen = (3 * (self.order + 1)).min(n - 1);

        let mut ext = Vec::with_capacity(n + 2 * padlen);
        let first = x[0];
        let last = x[n - 1];
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));

        self.run(&mut ext);
        ext.reverse();
        self.run(&mut ext);
        ext.reverse();

        x.copy_from_slice(&ext[padlen..padlen + n]);
    }

    /// One pass through every section. Each section starts in the steady
    /// state of its first input sample.
    fn run(&self, x: &mut [f64]) {
        for coeffs in &self.sections {
            let Some(&start) = x.first() else { return };
            let dc_gain = (coeffs.b0 + coeffs.b1 + coeffs.b2) / (1.0 + coeffs.a1 + coeffs.a2);
            let mut section = DirectForm2Transposed::<f64>::new(*coeffs);
            for v in x.iter_mut() {
                *v = section.run(*v - start) + start * dc_gain;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Low,
    High,
}

/// Sections for one Butterworth edge of the given order.
fn edge_sections(edge: Edge, fs: f64, f0: f64, order: usize) -> Result<Vec<Coefficients<f64>>> {
    let nyquist = fs / 2.0;
    if !(f0.is_finite() && f0 > 0.0 && f0 < nyquist) {
        return Err(CleanError::config(format!(
            "cutoff {f0} Hz must lie between 0 and the Nyquist frequency {nyquist} Hz"
        )));
    }

    let n = order as f64;
    let mut sections = Vec::with_capacity(order / 2 + 1);
    for k in 0..order / 2 {
        // pole-pair quality factor of an order-n Butterworth prototype
        let q = 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2.0 * n)).sin());
        let kind = match edge {
            Edge::Low => biquad::Type::LowPass,
            Edge::High => biquad::Type::HighPass,
        };
        let coeffs = Coefficients::<f64>::from_params(kind, fs.hz(), f0.hz(), q)
            .map_err(|_| CleanError::config(format!("filter design failed at {f0} Hz")))?;
        sections.push(coeffs);
    }
    if order % 2 == 1 {
        sections.push(first_order(edge, fs, f0));
    }
    Ok(sections)
}

/// Bilinear-transformed single real pole, pre-warped to `f0`.
fn first_order(edge: Edge, fs: f64, f0: f64) -> Coefficients<f64> {
    let k = (PI * f0 / fs).tan();
    let a1 = (k - 1.0) / (k + 1.0);
    let (b0, b1) = match edge {
        Edge::Low => {
            let b = k / (1.0 + k);
            (b, b)
        }
        Edge::High => {
            let b = 1.0 / (1.0 + k);
            (b, -b)
        }
    };
    Coefficients {
        a1,
        a2: 0.0,
        b0,
        b1,
        b2: 0.0,
    }
}
