//! Reliability gate for the fixed-length windows scanned during template search.

use crate::{config::DetectionParams, peaks::find_peaks};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Outcome of evaluating one scan window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub start: usize,
    pub end: usize,
    /// Coarse envelope peaks found in the window.
    pub peak_count: usize,
    /// `median(IBI - mean(IBI))` in samples, `None` with fewer than two peaks.
    pub madnn: Option<f64>,
    /// Template candidates that fit inside the window.
    pub candidates: usize,
    pub accepted: bool,
}

/// Coarse beat locations inside one window, with the gate decision.
#[derive(Debug, Clone)]
pub struct WindowAssessment {
    pub window: Range<usize>,
    /// Absolute sample indices, strictly increasing.
    pub peaks: Vec<usize>,
    pub madnn: Option<f64>,
    pub reliable: bool,
}

/// Consecutive, non-overlapping windows of `window_samples`, stopping before the
/// first window that would run past the end of the signal.
pub fn scan_windows(
    signal_len: usize,
    window_samples: usize,
) -> impl Iterator<Item = Range<usize>> {
    (0..)
        .map(move |k: usize| k * window_samples..(k + 1) * window_samples)
        .take_while(move |w| window_samples > 0 && w.end <= signal_len)
}

/// Find coarse peaks in `envelope[window]` and apply the beat-count and
/// interval-regularity gate.
pub fn assess_window(
    envelope: &[f64],
    window: Range<usize>,
    params: &DetectionParams,
) -> WindowAssessment {
    let slice = &envelope[window.clone()];
    let scale = slice.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let peaks: Vec<usize> = if scale > 0.0 {
        let normalized: Vec<f64> = slice.iter().map(|v| v / scale).collect();
        find_peaks(&normalized, params.envelope_min_prominence, 0)
            .into_iter()
            .map(|idx| idx + window.start)
            .collect()
    } else {
        Vec::new()
    };

    let intervals: Vec<f64> = peaks
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64)
        .collect();
    let madnn = madnn(&intervals);
    let reliable = peaks.len() >= params.min_window_beats
        && madnn.is_some_and(|value| value < params.max_madnn_samples);

    WindowAssessment {
        window,
        peaks,
        madnn,
        reliable,
    }
}

/// `median(IBI - mean(IBI))`.
///
/// This is a signed statistic and not the usual median absolute deviation; the
/// gate threshold is calibrated against exactly this form.
pub fn madnn(intervals: &[f64]) -> Option<f64> {
    if intervals.is_empty() {
        return None;
    }
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let deviations: Vec<f64> = intervals.iter().map(|ibi| ibi - mean).collect();
    median(&deviations)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;

    fn params() -> DetectionParams {
        DetectorConfig::default().resolve(100.0).unwrap()
    }

    /// Smooth humps at the given sample positions.
    fn humps(len: usize, centers: &[usize], heights: &[f64]) -> Vec<f64> {
        (0..len)
            .map(|i| {
                centers
                    .iter()
                    .zip(heights)
                    .map(|(&c, &h)| h * (-((i as f64 - c as f64) / 8.0).powi(2)).exp())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn madnn_is_signed_median_of_deviation() {
        assert_eq!(madnn(&[100.0, 100.0, 100.0, 160.0]), Some(-15.0));
        assert_eq!(madnn(&[90.0, 100.0, 110.0]), Some(0.0));
        assert_eq!(madnn(&[]), None);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn windows_are_consecutive_and_complete() {
        let windows: Vec<_> = scan_windows(3500, 1000).collect();
        assert_eq!(windows, vec![0..1000, 1000..2000, 2000..3000]);
        assert_eq!(scan_windows(999, 1000).count(), 0);
        assert_eq!(scan_windows(10, 0).count(), 0);
    }

    #[test]
    fn regular_window_is_accepted() {
        let centers: Vec<usize> = (0..10).map(|k| 50 + 100 * k).collect();
        let env = humps(1000, &centers, &[1.0; 10]);
        let assessment = assess_window(&env, 0..1000, &params());
        assert_eq!(assessment.peaks, centers);
        assert_eq!(assessment.madnn, Some(0.0));
        assert!(assessment.reliable);
    }

    #[test]
    fn too_few_beats_are_rejected() {
        let env = humps(1000, &[100, 400, 700], &[1.0; 3]);
        let assessment = assess_window(&env, 0..1000, &params());
        assert_eq!(assessment.peaks.len(), 3);
        assert!(!assessment.reliable);
    }

    #[test]
    fn dominant_artifact_hides_beats() {
        let mut centers: Vec<usize> = (0..10).map(|k| 50 + 100 * k).collect();
        let mut heights = vec![1.0; 10];
        centers.push(480);
        heights.push(500.0);
        let env = humps(1000, &centers, &heights);
        let assessment = assess_window(&env, 0..1000, &params());
        assert!(assessment.peaks.len() < 5);
        assert!(!assessment.reliable);
    }

    #[test]
    fn irregular_intervals_are_rejected() {
        // ten beats, but a burst of short intervals at the end of the window
        let centers = [20, 170, 320, 470, 620, 770, 790, 810, 830, 850];
        let env = humps(1000, &centers, &[1.0; 10]);
        let assessment = assess_window(&env, 0..1000, &params());
        assert_eq!(assessment.peaks.len(), 10);
        let value = assessment.madnn.unwrap();
        assert!(value >= 33.5, "madnn {value}");
        assert!(!assessment.reliable);
    }

    #[test]
    fn peaks_are_reported_in_absolute_samples() {
        let centers: Vec<usize> = (0..10).map(|k| 1050 + 100 * k).collect();
        let env = humps(2000, &centers, &[1.0; 10]);
        let assessment = assess_window(&env, 1000..2000, &params());
        assert_eq!(assessment.peaks, centers);
    }

    #[test]
    fn silent_window_has_no_peaks() {
        let assessment = assess_window(&[0.0; 1000], 0..1000, &params());
        assert!(assessment.peaks.is_empty());
        assert_eq!(assessment.madnn, None);
        assert!(!assessment.reliable);
    }
}
