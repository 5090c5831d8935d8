//! WebProbe Core - Foundation types and error handling
//!
//! This crate provides the core abstractions used throughout the WebProbe engine:
//! - `Target`: The validated base URL a scan runs against
//! - `Finding`: A vulnerability or misconfiguration discovered by a check
//! - `ScanResult`: The sealed aggregate handed to reporting
//! - `Severity`, `ScanStatus`, `ProgressEvent`: Core enums

pub mod error;
pub mod finding;
pub mod progress;
pub mod result;
pub mod severity;
pub mod target;

// Re-export commonly used types at crate root
pub use error::{Error, ProbeError, Result};
pub use finding::{Finding, FindingBuilder, FindingKey};
pub use progress::{CheckStatus, ProgressEvent};
pub use result::{CheckError, ScanAggregate, ScanResult, ScanStatus, SealInfo, SeverityCounts};
pub use severity::Severity;
pub use target::{Target, TargetParseError};
