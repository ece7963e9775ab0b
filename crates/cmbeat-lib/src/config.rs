use crate::{envelope::EnvelopeMethod, error::DetectError};
use serde::{Deserialize, Serialize};

/// Configurable parameters for template selection and correlation-based beat picking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Length of each candidate window scanned for a template (seconds).
    pub time_window_s: f64,
    /// Template span before the envelope peak (seconds).
    pub pre_s: f64,
    /// Template span after the envelope peak (seconds).
    pub post_s: f64,
    /// How the coarse envelope is built.
    pub envelope: EnvelopeMethod,
    /// Minimum prominence of a coarse peak in the max-normalized envelope.
    pub envelope_min_prominence: f64,
    /// Upper bound on the window's MADNN statistic (seconds).
    pub max_madnn_s: f64,
    /// Minimum prominence of a beat in the correlation trace.
    pub ncc_min_prominence: f64,
    /// Minimum spacing between detected beats (samples); `None` means half a second.
    pub ncc_min_distance_samples: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            time_window_s: 10.0,
            pre_s: 0.2,
            post_s: 0.5,
            envelope: EnvelopeMethod::default(),
            envelope_min_prominence: 0.25,
            max_madnn_s: 0.335,
            ncc_min_prominence: 0.5,
            ncc_min_distance_samples: None,
        }
    }
}

/// Sample-domain parameters resolved once per run from a [`DetectorConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    pub fs: f64,
    pub time_window_s: f64,
    pub window_samples: usize,
    /// `floor(time_window_s / 2)`, i.e. 30 BPM over the window.
    pub min_window_beats: usize,
    pub max_madnn_samples: f64,
    pub pre_samples: usize,
    pub post_samples: usize,
    pub envelope_min_prominence: f64,
    pub ncc_min_prominence: f64,
    pub ncc_min_distance: usize,
}

impl DetectionParams {
    pub fn template_len(&self) -> usize {
        self.pre_samples + self.post_samples
    }
}

impl DetectorConfig {
    /// Validate every option against the sampling rate and fix the sample counts.
    pub fn resolve(&self, fs: f64) -> Result<DetectionParams, DetectError> {
        if !fs.is_finite() || fs <= 0.0 {
            return Err(DetectError::InvalidConfig(format!(
                "sampling rate must be positive, got {fs}"
            )));
        }
        positive("time_window_s", self.time_window_s)?;
        non_negative("pre_s", self.pre_s)?;
        non_negative("post_s", self.post_s)?;
        non_negative("envelope_min_prominence", self.envelope_min_prominence)?;
        positive("max_madnn_s", self.max_madnn_s)?;
        non_negative("ncc_min_prominence", self.ncc_min_prominence)?;
        self.envelope.validate(fs)?;

        let window_samples = to_samples("time_window_s", self.time_window_s, fs)?;
        let pre_samples = to_samples("pre_s", self.pre_s, fs)?;
        let post_samples = to_samples("post_s", self.post_s, fs)?;
        let template_len = pre_samples.checked_add(post_samples).ok_or_else(|| {
            DetectError::InvalidConfig(format!(
                "template of {pre_samples} + {post_samples} samples overflows"
            ))
        })?;
        if template_len < 2 {
            return Err(DetectError::InvalidConfig(format!(
                "template spans {template_len} samples; pre_s + post_s is too short for fs = {fs}"
            )));
        }
        if template_len > window_samples {
            return Err(DetectError::InvalidConfig(format!(
                "template ({template_len} samples) does not fit in a {window_samples}-sample window"
            )));
        }
        let ncc_min_distance = self
            .ncc_min_distance_samples
            .unwrap_or_else(|| (fs / 2.0).round() as usize);

        Ok(DetectionParams {
            fs,
            time_window_s: self.time_window_s,
            window_samples,
            min_window_beats: (self.time_window_s / 2.0).floor() as usize,
            max_madnn_samples: self.max_madnn_s * fs,
            pre_samples,
            post_samples,
            envelope_min_prominence: self.envelope_min_prominence,
            ncc_min_prominence: self.ncc_min_prominence,
            ncc_min_distance,
        })
    }
}

/// `round(seconds * fs)`, refusing products that do not fit a sample count.
fn to_samples(name: &str, seconds: f64, fs: f64) -> Result<usize, DetectError> {
    let samples = (seconds * fs).round();
    if samples.is_finite() && samples >= 0.0 && samples < usize::MAX as f64 {
        Ok(samples as usize)
    } else {
        Err(DetectError::InvalidConfig(format!(
            "{name} = {seconds} s is too long at fs = {fs} Hz"
        )))
    }
}

fn positive(name: &str, value: f64) -> Result<(), DetectError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DetectError::InvalidConfig(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), DetectError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DetectError::InvalidConfig(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_at_100_hz() {
        let params = DetectorConfig::default().resolve(100.0).unwrap();
        assert_eq!(params.window_samples, 1000);
        assert_eq!(params.min_window_beats, 5);
        assert_eq!(params.pre_samples, 20);
        assert_eq!(params.post_samples, 50);
        assert_eq!(params.template_len(), 70);
        assert_eq!(params.ncc_min_distance, 50);
        assert!((params.max_madnn_samples - 33.5).abs() < 1e-9);
    }

    #[test]
    fn explicit_distance_overrides_half_second() {
        let cfg = DetectorConfig {
            ncc_min_distance_samples: Some(80),
            ..DetectorConfig::default()
        };
        assert_eq!(cfg.resolve(250.0).unwrap().ncc_min_distance, 80);
    }

    #[test]
    fn rejects_negative_prominence() {
        let cfg = DetectorConfig {
            ncc_min_prominence: -0.1,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            cfg.resolve(100.0),
            Err(DetectError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_template_longer_than_window() {
        let cfg = DetectorConfig {
            time_window_s: 0.5,
            ..DetectorConfig::default()
        };
        assert!(cfg.resolve(100.0).is_err());
    }

    #[test]
    fn rejects_spans_too_long_to_count() {
        let cfg = DetectorConfig {
            pre_s: 1e300,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            cfg.resolve(100.0),
            Err(DetectError::InvalidConfig(_))
        ));

        // each half fits on its own, the sum does not
        let half = usize::MAX as f64 / 2.0 / 100.0;
        let cfg = DetectorConfig {
            time_window_s: half,
            pre_s: half,
            post_s: half,
            ..DetectorConfig::default()
        };
        assert!(cfg.resolve(100.0).is_err());
    }

    #[test]
    fn rejects_cutoff_above_nyquist() {
        // 3 Hz low-pass cannot be designed at 4 Hz sampling
        assert!(matches!(
            DetectorConfig::default().resolve(4.0),
            Err(DetectError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: DetectorConfig =
            serde_json::from_str(r#"{"pre_s": 0.1, "envelope": {"kind": "analytic-magnitude"}}"#)
                .unwrap();
        assert_eq!(cfg.pre_s, 0.1);
        assert_eq!(cfg.post_s, 0.5);
        assert_eq!(cfg.envelope, EnvelopeMethod::AnalyticMagnitude);
    }
}
