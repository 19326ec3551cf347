pub mod copy;
pub mod signal;
pub mod telemetry;
pub mod version;
