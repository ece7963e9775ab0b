use crate::{
    config::{DetectionParams, DetectorConfig},
    correlation::{normalized_cross_correlation, template_anchor},
    detectors::{template::select_template, window::WindowReport},
    envelope::EnvelopeExtractor,
    error::DetectError,
    peaks::find_peaks,
    signal::{Events, TimeSeries},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Everything a detection run produces.
///
/// When no window passes the reliability gate the run still succeeds: `heartbeats`,
/// `template`, `template_window` and `ncc_trace` are empty and `message` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatDetection {
    pub fs: f64,
    pub sample_count: usize,
    pub heartbeats: Events,
    pub template: Vec<f64>,
    /// Absolute sample indices the template was cut from.
    pub template_window: Vec<usize>,
    /// Correlation of the template at every sample, clipped to `[0, 1]`.
    pub ncc_trace: Vec<f64>,
    pub params: DetectionParams,
    pub scan: Vec<WindowReport>,
    pub message: Option<String>,
}

impl HeartbeatDetection {
    fn unreliable(
        ts: &TimeSeries,
        params: DetectionParams,
        scan: Vec<WindowReport>,
        message: String,
    ) -> Self {
        Self {
            fs: ts.fs,
            sample_count: ts.len(),
            heartbeats: Events::default(),
            template: Vec::new(),
            template_window: Vec::new(),
            ncc_trace: Vec::new(),
            params,
            scan,
            message: Some(message),
        }
    }

    /// False when template selection found no usable stretch of signal.
    pub fn is_reliable(&self) -> bool {
        !self.template.is_empty()
    }
}

/// Detect heartbeats using the envelope method named in `cfg`.
pub fn detect_heartbeats(
    ts: &TimeSeries,
    cfg: &DetectorConfig,
) -> Result<HeartbeatDetection, DetectError> {
    detect_heartbeats_with(ts, cfg, &cfg.envelope)
}

/// Detect heartbeats with a caller-supplied envelope in place of `cfg.envelope`.
pub fn detect_heartbeats_with<E>(
    ts: &TimeSeries,
    cfg: &DetectorConfig,
    envelope: &E,
) -> Result<HeartbeatDetection, DetectError>
where
    E: EnvelopeExtractor + ?Sized,
{
    ts.validate()?;
    let params = cfg.resolve(ts.fs)?;

    let env = envelope.extract(&ts.data, ts.fs)?;
    if env.len() != ts.len() {
        return Err(DetectError::InvalidConfig(format!(
            "envelope has {} samples for a {}-sample signal",
            env.len(),
            ts.len()
        )));
    }
    if env.iter().any(|v| !v.is_finite()) {
        return Err(DetectError::InvalidConfig(
            "envelope contains non-finite values".into(),
        ));
    }

    let search = select_template(&ts.data, &env, &params);
    let Some(selection) = search.selection else {
        let message = if ts.len() < params.window_samples {
            format!(
                "no reliable segment found: {} samples is shorter than one {}-sample window",
                ts.len(),
                params.window_samples
            )
        } else {
            format!(
                "no reliable segment found in {} window(s) of {} s",
                search.scan.len(),
                params.time_window_s
            )
        };
        warn!("{message}");
        return Ok(HeartbeatDetection::unreliable(ts, params, search.scan, message));
    };

    let anchor = template_anchor(&selection.template);
    let ncc_trace = normalized_cross_correlation(&ts.data, &selection.template, anchor)?;
    let heartbeats = find_peaks(
        &ncc_trace,
        params.ncc_min_prominence,
        params.ncc_min_distance,
    );
    info!(
        "{} heartbeats in {:.1} s (template from window {}..{})",
        heartbeats.len(),
        ts.duration(),
        selection.source_window.start,
        selection.source_window.end
    );

    Ok(HeartbeatDetection {
        fs: ts.fs,
        sample_count: ts.len(),
        heartbeats: Events::from_indices(heartbeats),
        template: selection.template,
        template_window: selection.window.collect(),
        ncc_trace,
        params,
        scan: search.scan,
        message: None,
    })
}
