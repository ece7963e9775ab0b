//! Automatic template selection: scan windows until one passes the reliability
//! gate, cut a candidate beat around every coarse peak in it, and keep the
//! candidate that correlates most consistently with the others.

use crate::{
    config::DetectionParams,
    correlation::CorrelationMatrix,
    detectors::window::{assess_window, scan_windows, WindowReport},
};
use log::{debug, info};
use std::ops::Range;

/// One fixed-length beat waveform cut from the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCandidate {
    /// Coarse peak the segment was cut around.
    pub peak: usize,
    /// Absolute sample range of the segment.
    pub window: Range<usize>,
    pub samples: Vec<f64>,
}

/// The chosen template and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSelection {
    pub template: Vec<f64>,
    /// Absolute sample range the template was cut from.
    pub window: Range<usize>,
    /// The scan window that passed the gate.
    pub source_window: Range<usize>,
    pub candidate_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSearch {
    pub selection: Option<TemplateSelection>,
    /// Every window evaluated, in scan order.
    pub scan: Vec<WindowReport>,
}

/// Cut `[peak - pre + 1, peak + post]` around each peak, dropping peaks whose
/// segment would leave `window`. Every candidate is `pre + post` samples long
/// and the peak sits at offset `pre - 1`.
pub fn segment_candidates(
    signal: &[f64],
    peaks: &[usize],
    window: Range<usize>,
    pre: usize,
    post: usize,
) -> Vec<TemplateCandidate> {
    peaks
        .iter()
        .filter_map(|&peak| {
            let start = (peak + 1).checked_sub(pre)?;
            let end = peak + post + 1;
            if start < window.start || end > window.end || end > signal.len() {
                return None;
            }
            Some(TemplateCandidate {
                peak,
                window: start..end,
                samples: signal[start..end].to_vec(),
            })
        })
        .collect()
}

/// Mean over sample standard deviation of one correlation column. A column
/// with no spread scores `+inf`.
pub fn consistency_score(column: &[f64]) -> f64 {
    let n = column.len();
    if n < 2 {
        return f64::INFINITY;
    }
    let mean = column.iter().sum::<f64>() / n as f64;
    let var = column.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let sd = var.sqrt();
    if sd <= f64::EPSILON {
        f64::INFINITY
    } else {
        mean / sd
    }
}

/// Index of the most consistently correlated candidate; the first one wins ties.
/// A single candidate is selected outright. `None` only for an empty matrix.
pub fn rank_candidates(matrix: &CorrelationMatrix) -> Option<usize> {
    if matrix.is_empty() {
        return None;
    }
    if matrix.size() == 1 {
        return Some(0);
    }
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for col in 0..matrix.size() {
        let score = consistency_score(matrix.column(col));
        if score > best_score {
            best = col;
            best_score = score;
        }
    }
    Some(best)
}

/// Walk the scan windows in order and return the template from the first one
/// that passes the reliability gate and yields at least one candidate.
pub fn select_template(
    signal: &[f64],
    envelope: &[f64],
    params: &DetectionParams,
) -> TemplateSearch {
    let mut search = TemplateSearch::default();

    for window in scan_windows(signal.len(), params.window_samples) {
        let assessment = assess_window(envelope, window.clone(), params);
        let candidates = if assessment.reliable {
            segment_candidates(
                signal,
                &assessment.peaks,
                window.clone(),
                params.pre_samples,
                params.post_samples,
            )
        } else {
            Vec::new()
        };
        let accepted = assessment.reliable && !candidates.is_empty();
        debug!(
            "window {}..{}: {} peaks, madnn {:?}, {} candidates, accepted={}",
            window.start,
            window.end,
            assessment.peaks.len(),
            assessment.madnn,
            candidates.len(),
            accepted
        );
        search.scan.push(WindowReport {
            start: window.start,
            end: window.end,
            peak_count: assessment.peaks.len(),
            madnn: assessment.madnn,
            candidates: candidates.len(),
            accepted,
        });
        if !accepted {
            continue;
        }

        let segments: Vec<&[f64]> = candidates.iter().map(|c| c.samples.as_slice()).collect();
        let matrix = CorrelationMatrix::from_segments(&segments);
        let Some(best) = rank_candidates(&matrix) else {
            continue;
        };
        let chosen = &candidates[best];
        info!(
            "template cut at {}..{} (peak {}), candidate {} of {}",
            chosen.window.start,
            chosen.window.end,
            chosen.peak,
            best + 1,
            candidates.len()
        );
        search.selection = Some(TemplateSelection {
            template: chosen.samples.clone(),
            window: chosen.window.clone(),
            source_window: window,
            candidate_count: candidates.len(),
        });
        break;
    }
    search
}
