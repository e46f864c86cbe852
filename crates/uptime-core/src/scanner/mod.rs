pub mod engine;
pub mod state;
pub mod validate;

pub use engine::MonitorScanner;
pub use state::{ScanReport, ScannerState};
pub use validate::{validate, CheckProcessor, LoggingProcessor, ScannedCheck};
