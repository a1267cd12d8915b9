// Audio module - probe tone synthesis, mixing and output

pub mod backend;
pub mod engine;
pub mod mixer;
pub mod registry;
pub mod tone;
pub mod voice;

// Re-export commonly used types for convenience
pub use backend::{CaptureBuffer, CpalBackend, OfflineBackend, OutputBackend, OutputStream, Pace};
pub use engine::ToneEngine;
pub use registry::ToneId;
pub use tone::{Channel, ToneRequest};
pub use voice::render_tone;
