//! WebProbe Checks - Check registry, YAML probe checks, and check loader
//!
//! This crate provides:
//! - `CheckRegistry`: name to factory index of every runnable check
//! - YAML parser for declarative probe checks
//! - Check loader that registers definitions found in a directory

pub mod loader;
pub mod registry;
pub mod yaml_check;

pub use loader::{load_checks_from_dir, register_checks_from_dir};
pub use registry::{CheckFactory, CheckRegistry};
pub use yaml_check::{DefinitionError, ProbeDefinition, YamlCheck, YamlCheckDefinition};
