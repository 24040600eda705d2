pub mod response;
pub mod telemetry;
