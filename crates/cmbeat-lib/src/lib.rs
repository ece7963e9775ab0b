pub mod config;
pub mod correlation;
pub mod detectors;
pub mod envelope;
pub mod error;
pub mod peaks;
pub mod signal;

pub use config::*;
pub use detectors::*;
pub use error::*;
pub use envelope::{EnvelopeExtractor, EnvelopeMethod};
pub use signal::*;
