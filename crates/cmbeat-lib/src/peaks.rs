//! Prominence/distance constrained peak picking, shared by the coarse envelope
//! stage and the final correlation stage.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Indices of local maxima with prominence `>= min_prominence`, thinned so that
/// any two survivors are at least `min_distance` samples apart.
///
/// The result is sorted and does not depend on the order in which candidates are
/// visited. An empty result is a normal outcome.
pub fn find_peaks(values: &[f64], min_prominence: f64, min_distance: usize) -> Vec<usize> {
    let candidates = local_maxima(values);
    let prominences = compute_prominences(&candidates, values);
    let peaks: Vec<usize> = candidates
        .into_iter()
        .zip(prominences)
        .filter(|(_, prominence)| *prominence >= min_prominence)
        .map(|(idx, _)| idx)
        .collect();
    if min_distance > 1 {
        filter_by_distance(&peaks, values, min_distance)
    } else {
        peaks
    }
}

/// Strict local maxima. A flat top counts once, at its first sample; the two
/// end samples are never peaks.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if values[i] > values[i - 1] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push(i);
            }
            i = ahead;
        } else {
            i += 1;
        }
    }
    peaks
}

/// Height of each peak above the higher of its two bases. A base is the lowest
/// point between the peak and the nearest strictly higher sample on that side,
/// or the signal edge when there is none.
pub fn compute_prominences(peaks: &[usize], values: &[f64]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = values[peak];

            let mut left_min = height;
            for &v in values[..peak].iter().rev() {
                if v > height {
                    break;
                }
                left_min = left_min.min(v);
            }

            let mut right_min = height;
            for &v in &values[peak + 1..] {
                if v > height {
                    break;
                }
                right_min = right_min.min(v);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Greedy thinning: visit peaks from tallest to shortest (on equal height the
/// later one first) and keep a peak only if no kept peak is closer than
/// `min_distance`.
pub fn filter_by_distance(peaks: &[usize], values: &[f64], min_distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = peaks.to_vec();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
            .then(b.cmp(&a))
    });

    let reach = min_distance.saturating_sub(1);
    let mut kept = BTreeSet::new();
    for idx in order {
        let lo = idx.saturating_sub(reach);
        let hi = idx.saturating_add(reach);
        if kept.range(lo..=hi).next().is_none() {
            kept.insert(idx);
        }
    }
    kept.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_or_flat_input_has_no_peaks() {
        assert!(find_peaks(&[], 0.0, 0).is_empty());
        assert!(find_peaks(&[1.0, 2.0], 0.0, 0).is_empty());
        assert!(find_peaks(&[0.5; 20], 0.0, 0).is_empty());
    }

    #[test]
    fn finds_every_local_maximum() {
        let x = [0.0, 1.0, 0.0, 2.0, 0.0, 1.5, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 0), vec![1, 3, 5]);
    }

    #[test]
    fn prominence_is_measured_to_higher_terrain() {
        let x = [0.0, 3.0, 2.0, 2.5, 0.0];
        let peaks = local_maxima(&x);
        assert_eq!(peaks, vec![1, 3]);
        let prom = compute_prominences(&peaks, &x);
        assert!((prom[0] - 3.0).abs() < 1e-12);
        assert!((prom[1] - 0.5).abs() < 1e-12);
        assert_eq!(find_peaks(&x, 1.0, 0), vec![1]);
    }

    #[test]
    fn shorter_neighbour_is_dropped() {
        let x = [0.0, 2.0, 0.0, 3.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 3), vec![3, 7]);
    }

    #[test]
    fn equal_heights_keep_the_later_peak() {
        let x = [0.0, 1.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 3), vec![3]);
        // far enough apart, both survive
        assert_eq!(find_peaks(&x, 0.0, 2), vec![1, 3]);
    }

    #[test]
    fn plateau_reports_first_sample() {
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 1.0, 0.0]), vec![1]);
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn survivors_respect_min_distance() {
        let x: Vec<f64> = (0..400)
            .map(|i| ((i as f64) * 0.37).sin() + 0.3 * ((i as f64) * 1.9).cos())
            .collect();
        let peaks = find_peaks(&x, 0.0, 25);
        assert!(!peaks.is_empty());
        assert!(peaks.windows(2).all(|w| w[1] - w[0] >= 25));
    }

    #[test]
    fn lower_prominence_yields_superset() {
        // tall beats every 100 samples with small ripples in between
        let x: Vec<f64> = (0..1000)
            .map(|i| {
                let phase = (i % 100) as f64;
                let beat = (-((phase - 50.0) / 4.0).powi(2)).exp();
                beat + 0.1 * (i as f64 * 0.6).sin().max(0.0)
            })
            .collect();
        let strict = find_peaks(&x, 0.5, 50);
        let loose = find_peaks(&x, 0.01, 50);
        assert_eq!(strict.len(), 10);
        assert!(loose.len() >= strict.len());
        assert!(strict.iter().all(|p| loose.contains(p)));
    }
}
