use crate::error::DetectError;
use serde::{Deserialize, Serialize};

/// Uniformly sampled cardiomechanical recording (SCG, GCG, PCG, pulse wave).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }

    /// Reject recordings the detector cannot reason about: a non-positive or
    /// non-finite sampling rate, or any NaN/infinite sample.
    pub fn validate(&self) -> Result<(), DetectError> {
        if !self.fs.is_finite() || self.fs <= 0.0 {
            return Err(DetectError::InvalidSignal(format!(
                "sampling rate must be positive and finite, got {}",
                self.fs
            )));
        }
        if let Some(idx) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(DetectError::InvalidSignal(format!(
                "sample {} is not finite ({})",
                idx, self.data[idx]
            )));
        }
        Ok(())
    }
}

/// Point events on a timeline (detected heartbeats, reference R-peaks).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Inter-beat intervals in samples.
    pub fn intervals(&self) -> Vec<f64> {
        self.indices
            .windows(2)
            .map(|w| w[1] as f64 - w[0] as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_nan_samples() {
        let ts = TimeSeries::new(100.0, vec![0.0, f64::NAN, 1.0]);
        assert!(matches!(ts.validate(), Err(DetectError::InvalidSignal(_))));
    }

    #[test]
    fn validate_rejects_zero_fs() {
        let ts = TimeSeries::new(0.0, vec![0.0; 4]);
        assert!(ts.validate().is_err());
    }

    #[test]
    fn intervals_are_first_difference() {
        let events = Events::from_indices(vec![10, 110, 205]);
        assert_eq!(events.intervals(), vec![100.0, 95.0]);
    }
}
