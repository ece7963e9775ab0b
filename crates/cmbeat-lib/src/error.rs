use thiserror::Error;

/// Errors raised before or during a detection run.
///
/// A recording that never yields a reliable window is *not* an error; it comes
/// back as an empty [`HeartbeatDetection`](crate::detectors::beats::HeartbeatDetection)
/// carrying a message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// An option is out of range or inconsistent with the sampling rate
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    /// The recording itself is unusable (bad sampling rate, non-finite samples)
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// Low-pass filter design failed
    #[error("filter design failed: {0}")]
    Filter(String),

    /// The FFT backend rejected a buffer
    #[error("FFT failed: {0}")]
    Fft(String),
}
