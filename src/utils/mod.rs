pub mod content_disposition;
pub mod telemetry;

pub use content_disposition::extract_filename;
pub use telemetry::init_tracing;
