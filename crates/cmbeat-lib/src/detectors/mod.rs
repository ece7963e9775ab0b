pub mod beats;
pub mod template;
pub mod window;

pub use beats::{detect_heartbeats, detect_heartbeats_with, HeartbeatDetection};
