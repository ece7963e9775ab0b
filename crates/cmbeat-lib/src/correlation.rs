//! Correlation primitives: the pairwise lag-maximised coefficient used to rank
//! template candidates, and the sliding normalized cross-correlation used to
//! scan the whole recording.

use crate::error::DetectError;
use realfft::RealFftPlanner;

/// Largest cross-correlation coefficient between `a` and `b` over every lag
/// with at least one overlapping sample.
///
/// Coefficients are normalised by `sqrt(Σa² · Σb²)` so a scaled, shifted copy
/// scores 1. Zero-energy inputs score 0. The value is symmetric in its
/// arguments and lies in `[-1, 1]`.
pub fn max_xcorr_coeff(a: &[f64], b: &[f64]) -> f64 {
    let energy_a: f64 = a.iter().map(|x| x * x).sum();
    let energy_b: f64 = b.iter().map(|x| x * x).sum();
    let norm = (energy_a * energy_b).sqrt();
    if norm <= 0.0 {
        return 0.0;
    }

    let (n, m) = (a.len() as isize, b.len() as isize);
    let mut best = f64::NEG_INFINITY;
    for lag in -(n - 1)..m {
        let a_start = (-lag).max(0) as usize;
        let b_start = lag.max(0) as usize;
        let overlap = (a.len() - a_start).min(b.len() - b_start);
        let acc: f64 = a[a_start..a_start + overlap]
            .iter()
            .zip(&b[b_start..b_start + overlap])
            .map(|(x, y)| x * y)
            .sum();
        best = best.max(acc);
    }
    (best / norm).clamp(-1.0, 1.0)
}

/// Square, symmetric matrix of [`max_xcorr_coeff`] over a set of equal-length
/// segments, with the diagonal fixed at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn from_segments<S: AsRef<[f64]>>(segments: &[S]) -> Self {
        let size = segments.len();
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
            for j in (i + 1)..size {
                let r = max_xcorr_coeff(segments[i].as_ref(), segments[j].as_ref());
                values[i * size + j] = r;
                values[j * size + i] = r;
            }
        }
        Self { size, values }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.size + col]
    }

    /// Correlations of segment `col` with every segment, itself included.
    pub fn column(&self, col: usize) -> &[f64] {
        // symmetric, so the row slice is the column
        &self.values[col * self.size..(col + 1) * self.size]
    }
}

/// Offset of the template's largest absolute sample within its first half.
pub fn template_anchor(template: &[f64]) -> usize {
    let half = (template.len() + 1) / 2;
    let mut anchor = 0;
    let mut best = f64::NEG_INFINITY;
    for (idx, v) in template[..half].iter().enumerate() {
        if v.abs() > best {
            best = v.abs();
            anchor = idx;
        }
    }
    anchor
}

/// Relative floor on a window's variance below which it is treated as flat.
const FLAT_WINDOW_RATIO: f64 = 1e-8;

/// Sliding Pearson correlation of `template` against `signal`.
///
/// Every fully overlapping alignment `k` is scored and written to index
/// `k + anchor_offset`, so trace maxima sit on the template's anchor sample
/// rather than on its first sample. Indices without a full alignment, and
/// alignments over an (effectively) constant stretch of signal, stay 0.
/// Negative correlations are clipped to 0; the trace has exactly
/// `signal.len()` values in `[0, 1]`.
pub fn normalized_cross_correlation(
    signal: &[f64],
    template: &[f64],
    anchor_offset: usize,
) -> Result<Vec<f64>, DetectError> {
    let n = signal.len();
    let m = template.len();
    let mut trace = vec![0.0; n];
    if m == 0 || n < m {
        return Ok(trace);
    }

    let t_mean = template.iter().sum::<f64>() / m as f64;
    let centered_template: Vec<f64> = template.iter().map(|v| v - t_mean).collect();
    let t_energy: f64 = centered_template.iter().map(|v| v * v).sum();

    let s_mean = signal.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = signal.iter().map(|v| v - s_mean).collect();
    let global_variance = centered.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if t_energy <= 0.0 || global_variance <= 0.0 {
        return Ok(trace);
    }

    // the template is zero-mean, so the local signal mean drops out of the numerator
    let numerators = sliding_dot(&centered, &centered_template)?;

    let mut sum = vec![0.0; n + 1];
    let mut sum_sq = vec![0.0; n + 1];
    for (i, v) in centered.iter().enumerate() {
        sum[i + 1] = sum[i] + v;
        sum_sq[i + 1] = sum_sq[i] + v * v;
    }

    let floor = global_variance * m as f64 * FLAT_WINDOW_RATIO;
    for (k, numerator) in numerators.iter().enumerate() {
        let local_sum = sum[k + m] - sum[k];
        let local_var = sum_sq[k + m] - sum_sq[k] - local_sum * local_sum / m as f64;
        if local_var <= floor {
            continue;
        }
        let r = numerator / (t_energy * local_var).sqrt();
        let idx = k + anchor_offset;
        if idx < n {
            trace[idx] = r.clamp(0.0, 1.0);
        }
    }
    Ok(trace)
}

/// `out[k] = Σ_j signal[k + j] · kernel[j]` for every full overlap, via FFT.
fn sliding_dot(signal: &[f64], kernel: &[f64]) -> Result<Vec<f64>, DetectError> {
    let n = signal.len();
    let m = kernel.len();
    let size = (n + m - 1).next_power_of_two();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(size);
    let c2r = planner.plan_fft_inverse(size);

    let mut padded_signal = vec![0.0; size];
    padded_signal[..n].copy_from_slice(signal);
    let mut padded_kernel = vec![0.0; size];
    padded_kernel[..m].copy_from_slice(kernel);

    let mut signal_spec = r2c.make_output_vec();
    let mut kernel_spec = r2c.make_output_vec();
    r2c.process(&mut padded_signal, &mut signal_spec)
        .map_err(|e| DetectError::Fft(e.to_string()))?;
    r2c.process(&mut padded_kernel, &mut kernel_spec)
        .map_err(|e| DetectError::Fft(e.to_string()))?;

    for (s, k) in signal_spec.iter_mut().zip(kernel_spec.iter()) {
        *s *= k.conj();
    }
    // DC and Nyquist bins must be purely real for the inverse transform
    let last = signal_spec.len() - 1;
    signal_spec[0].im = 0.0;
    signal_spec[last].im = 0.0;

    let mut out = c2r.make_output_vec();
    c2r.process(&mut signal_spec, &mut out)
        .map_err(|e| DetectError::Fft(e.to_string()))?;

    let scale = 1.0 / size as f64;
    Ok(out[..n - m + 1].iter().map(|v| v * scale).collect())
}
