//! Check loader - loads check definitions from files

use crate::{CheckRegistry, YamlCheck};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webprobe_core::{Error, Result};
use webprobe_webapp::Check;

/// Load all checks from a directory into a fresh registry
pub fn load_checks_from_dir(dir: impl AsRef<Path>) -> Result<CheckRegistry> {
    let mut registry = CheckRegistry::new();
    register_checks_from_dir(&mut registry, dir)?;
    Ok(registry)
}

/// Register every YAML check found under `dir`, recursively.
///
/// Files are visited in path order. Malformed definitions are logged and
/// skipped. Returns how many checks were registered.
pub fn register_checks_from_dir(registry: &mut CheckRegistry, dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    info!("Loading checks from: {}", dir.display());
    let mut files = Vec::new();
    collect_yaml_files(dir, &mut files)?;
    files.sort();

    let mut loaded = 0;
    for path in files {
        match load_yaml_check(&path) {
            Ok(check) => {
                debug!("Loaded check: {} from {}", check.metadata().name, path.display());
                registry.register_check(Arc::new(check));
                loaded += 1;
            }
            Err(e) => {
                warn!("Failed to load check from {}: {}", path.display(), e);
            }
        }
    }

    info!("Loaded {} checks", loaded);
    Ok(loaded)
}

fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_yaml_files(&path, files)?;
        } else if let Some(ext) = path.extension() {
            if ext == "yaml" || ext == "yml" {
                files.push(path);
            }
        }
    }

    Ok(())
}

fn load_yaml_check(path: &Path) -> Result<YamlCheck> {
    let content = std::fs::read_to_string(path)?;

    YamlCheck::from_yaml(&content).map_err(|e| Error::InvalidCheckDefinition {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
