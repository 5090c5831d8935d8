//! WebProbe Scanner - Scan orchestration
//!
//! [`Scanner::start_scan`] runs a resolved set of checks against one target
//! under bounded concurrency and returns the sealed [`ScanResult`].
//!
//! [`ScanResult`]: webprobe_core::ScanResult

pub mod orchestrator;

pub use orchestrator::Scanner;
