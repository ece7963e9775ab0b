//! Coarse envelopes whose lobes line up with individual heartbeats.
//!
//! The default rectifies the recording with a high power and smooths it with a
//! zero-phase Butterworth low-pass, which leaves one hump per beat. Any other
//! smooth, non-negative trace can be plugged in through [`EnvelopeExtractor`].

use crate::error::DetectError;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, Type};
use realfft::{num_complex::Complex, RealFftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Anything that turns a recording into a beat envelope of the same length.
pub trait EnvelopeExtractor {
    fn extract(&self, signal: &[f64], fs: f64) -> Result<Vec<f64>, DetectError>;
}

impl<F> EnvelopeExtractor for F
where
    F: Fn(&[f64], f64) -> Vec<f64>,
{
    fn extract(&self, signal: &[f64], fs: f64) -> Result<Vec<f64>, DetectError> {
        Ok(self(signal, fs))
    }
}

/// Built-in envelope methods selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EnvelopeMethod {
    /// `|x|^exponent` followed by a zero-phase Butterworth low-pass.
    PowerLowpass {
        #[serde(default = "default_exponent")]
        exponent: i32,
        #[serde(default = "default_cutoff_hz")]
        cutoff_hz: f64,
        /// Filter order, must be even (one biquad per two poles).
        #[serde(default = "default_order")]
        order: usize,
    },
    /// Magnitude of the analytic signal (Hilbert transform).
    AnalyticMagnitude,
}

fn default_exponent() -> i32 {
    4
}

fn default_cutoff_hz() -> f64 {
    3.0
}

fn default_order() -> usize {
    2
}

impl Default for EnvelopeMethod {
    fn default() -> Self {
        EnvelopeMethod::PowerLowpass {
            exponent: default_exponent(),
            cutoff_hz: default_cutoff_hz(),
            order: default_order(),
        }
    }
}

impl EnvelopeMethod {
    pub fn validate(&self, fs: f64) -> Result<(), DetectError> {
        match *self {
            EnvelopeMethod::PowerLowpass {
                exponent,
                cutoff_hz,
                order,
            } => {
                if exponent < 1 {
                    return Err(DetectError::InvalidConfig(format!(
                        "envelope exponent must be >= 1, got {exponent}"
                    )));
                }
                if order == 0 || order % 2 != 0 {
                    return Err(DetectError::InvalidConfig(format!(
                        "envelope filter order must be a positive even number, got {order}"
                    )));
                }
                if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 || cutoff_hz >= fs / 2.0 {
                    return Err(DetectError::InvalidConfig(format!(
                        "envelope cutoff {cutoff_hz} Hz must lie in (0, {}) Hz",
                        fs / 2.0
                    )));
                }
                Ok(())
            }
            EnvelopeMethod::AnalyticMagnitude => Ok(()),
        }
    }
}

impl EnvelopeExtractor for EnvelopeMethod {
    fn extract(&self, signal: &[f64], fs: f64) -> Result<Vec<f64>, DetectError> {
        match *self {
            EnvelopeMethod::PowerLowpass {
                exponent,
                cutoff_hz,
                order,
            } => power_lowpass_envelope(signal, fs, exponent, cutoff_hz, order),
            EnvelopeMethod::AnalyticMagnitude => analytic_magnitude(signal),
        }
    }
}

/// Rectify with `|x|^exponent`, then smooth with a zero-phase low-pass.
///
/// Filter ringing can dip slightly below zero; those samples are clamped so the
/// envelope stays non-negative.
pub fn power_lowpass_envelope(
    signal: &[f64],
    fs: f64,
    exponent: i32,
    cutoff_hz: f64,
    order: usize,
) -> Result<Vec<f64>, DetectError> {
    let rectified: Vec<f64> = signal.iter().map(|x| x.abs().powi(exponent)).collect();
    let smoothed = zero_phase_lowpass(&rectified, fs, cutoff_hz, order)?;
    Ok(smoothed.into_iter().map(|v| v.max(0.0)).collect())
}

/// Butterworth low-pass run forward then backward over an odd-reflected copy
/// of the input, so the output has no phase lag.
pub fn zero_phase_lowpass(
    data: &[f64],
    fs: f64,
    cutoff_hz: f64,
    order: usize,
) -> Result<Vec<f64>, DetectError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut sections = butterworth_sections(fs, cutoff_hz, order)?;
    let pad = (3 * order).min(data.len() - 1);
    let mut buffer = odd_reflect(data, pad);

    forward_backward_filter(&mut buffer, &mut sections);

    Ok(buffer[pad..pad + data.len()].to_vec())
}

fn butterworth_sections(
    fs: f64,
    cutoff_hz: f64,
    order: usize,
) -> Result<Vec<DirectForm2Transposed<f64>>, DetectError> {
    let design_err = |e: biquad::Errors| {
        DetectError::Filter(format!(
            "low-pass at {cutoff_hz} Hz for fs = {fs} Hz: {e:?}"
        ))
    };
    // biquad takes the corner as a fraction of Nyquist (omega = PI * f0)
    let normalized_corner = 2.0 * cutoff_hz / fs;
    if !(normalized_corner > 0.0 && normalized_corner < 1.0) {
        return Err(design_err(biquad::Errors::OutsideNyquist));
    }
    (1..=order / 2)
        .map(|k| {
            // pole-pair quality factor of an order-n Butterworth prototype
            let q = 1.0 / (2.0 * ((2 * k - 1) as f64 * PI / (2 * order) as f64).cos());
            Coefficients::<f64>::from_normalized_params(Type::LowPass, normalized_corner, q)
                .map(DirectForm2Transposed::<f64>::new)
                .map_err(design_err)
        })
        .collect()
}

fn forward_backward_filter<F: Biquad<f64>>(signal: &mut [f64], sections: &mut [F]) {
    run_from_rest(signal, sections);
    signal.reverse();
    run_from_rest(signal, sections);
    signal.reverse();
}

/// Filter as if the input had been held at its first value forever. Valid for
/// unity-DC-gain low-pass sections only.
fn run_from_rest<F: Biquad<f64>>(signal: &mut [f64], sections: &mut [F]) {
    let rest = signal[0];
    signal.iter_mut().for_each(|x| *x -= rest);
    for filter in sections.iter_mut() {
        signal.iter_mut().for_each(|x| *x = filter.run(*x));
        filter.reset_state();
    }
    signal.iter_mut().for_each(|x| *x += rest);
}

fn odd_reflect(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
    out.extend_from_slice(data);
    out.extend((1..=pad).map(|i| 2.0 * last - data[n - 1 - i]));
    out
}

/// `|x + j·H{x}|` computed with a real FFT.
pub fn analytic_magnitude(signal: &[f64]) -> Result<Vec<f64>, DetectError> {
    let n = signal.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);

    let mut input = signal.to_vec();
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut input, &mut spectrum)
        .map_err(|e| DetectError::Fft(e.to_string()))?;

    let last = spectrum.len() - 1;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k == 0 || (n % 2 == 0 && k == last) {
            *bin = Complex::new(0.0, 0.0);
        } else {
            // multiply by -j
            *bin = Complex::new(bin.im, -bin.re);
        }
    }

    let mut quadrature = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut quadrature)
        .map_err(|e| DetectError::Fft(e.to_string()))?;

    let scale = 1.0 / n as f64;
    Ok(signal
        .iter()
        .zip(quadrature.iter())
        .map(|(x, h)| (x * x + (h * scale).powi(2)).sqrt())
        .collect())
}
