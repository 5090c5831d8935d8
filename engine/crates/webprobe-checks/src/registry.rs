//! Check registry - index of all available checks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use webprobe_core::{Error, Result, Severity};
use webprobe_webapp::checks::{CookieChecks, FileChecks, HeaderChecks, HttpMethodChecks, MiscChecks, ServerInfoChecks};
use webprobe_webapp::{Check, CheckCategory, CheckMetadata, ALL_CHECKS};

/// Builds a fresh check instance for one scan
pub type CheckFactory = Arc<dyn Fn() -> Arc<dyn Check> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    name: String,
    factory: CheckFactory,
    /// Metadata (for filtering without building a check)
    metadata: CheckMetadata,
}

/// Registry of all available checks, in registration order
#[derive(Clone, Default)]
pub struct CheckRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.names())
            .finish()
    }
}

impl CheckRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in checks
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Register the built-in checks in their default order
    pub fn register_builtin(&mut self) {
        self.register(HeaderChecks::NAME, || Arc::new(HeaderChecks::new()));
        self.register(ServerInfoChecks::NAME, || Arc::new(ServerInfoChecks::new()));
        self.register(FileChecks::NAME, || Arc::new(FileChecks::new()));
        self.register(HttpMethodChecks::NAME, || Arc::new(HttpMethodChecks::new()));
        self.register(CookieChecks::NAME, || Arc::new(CookieChecks::new()));
        self.register(MiscChecks::NAME, || Arc::new(MiscChecks::new()));
    }

    /// Register a check factory under `name`.
    ///
    /// Re-registering a name replaces the factory but keeps the name's
    /// original position.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Check> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: CheckFactory = Arc::new(factory);
        let metadata = factory().metadata().clone();
        let entry = Entry {
            name: name.clone(),
            factory,
            metadata,
        };

        match self.index.get(&name) {
            Some(&pos) => {
                warn!("Check '{}' registered twice, replacing previous definition", name);
                self.entries[pos] = entry;
            }
            None => {
                debug!("Registered check: {}", name);
                self.index.insert(name, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Register an already built, shareable check under its own name
    pub fn register_check(&mut self, check: Arc<dyn Check>) {
        let name = check.name().to_string();
        self.register(name, move || Arc::clone(&check));
    }

    /// Resolve a selection into runnable checks.
    ///
    /// An empty selection (or one containing "all") yields every check in
    /// registration order; other names next to "all" must still exist. Otherwise checks come back in the order requested,
    /// duplicates collapsed. Any unknown name fails the whole resolution.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Check>>> {
        if names.is_empty() || names.iter().any(|n| is_all(n)) {
            for name in names.iter().filter(|n| !is_all(n)) {
                self.entry(name.trim())?;
            }
            return Ok(self.entries.iter().map(|e| (e.factory)()).collect());
        }

        let mut seen = HashSet::new();
        let mut checks = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            let entry = self.entry(name)?;
            if seen.insert(name) {
                checks.push((entry.factory)());
            }
        }
        Ok(checks)
    }

    /// Resolve a selection, then drop the excluded names.
    ///
    /// Excluded names must exist too.
    pub fn resolve_excluding(&self, names: &[String], excluded: &[String]) -> Result<Vec<Arc<dyn Check>>> {
        for name in excluded {
            self.entry(name.trim())?;
        }
        let checks = self.resolve(names)?;
        Ok(checks
            .into_iter()
            .filter(|c| !excluded.iter().any(|x| x.trim() == c.name()))
            .collect())
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.index
            .get(name)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| Error::UnknownCheck { name: name.to_string() })
    }

    /// Build one check by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.entry(name).ok().map(|e| (e.factory)())
    }

    /// Get check metadata by name
    pub fn get_metadata(&self, name: &str) -> Option<&CheckMetadata> {
        self.entry(name).ok().map(|e| &e.metadata)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Metadata of every check, in registration order
    pub fn metadata(&self) -> impl Iterator<Item = &CheckMetadata> {
        self.entries.iter().map(|e| &e.metadata)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get number of registered checks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of checks in a category
    pub fn by_category(&self, category: CheckCategory) -> Vec<&str> {
        self.filter_names(|m| m.category == category)
    }

    /// Names of checks that can report at least `min_severity`
    pub fn by_min_severity(&self, min_severity: Severity) -> Vec<&str> {
        self.filter_names(|m| m.severity >= min_severity)
    }

    /// Names of checks carrying a tag
    pub fn by_tag(&self, tag: &str) -> Vec<&str> {
        self.filter_names(|m| m.has_tag(tag))
    }

    fn filter_names(&self, pred: impl Fn(&CheckMetadata) -> bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| pred(&e.metadata))
            .map(|e| e.name.as_str())
            .collect()
    }
}

fn is_all(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(ALL_CHECKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use webprobe_webapp::{CheckContext, CheckResult};

    struct TestCheck {
        metadata: CheckMetadata,
    }

    impl TestCheck {
        fn named(name: &str, severity: Severity) -> Arc<dyn Check> {
            Arc::new(TestCheck {
                metadata: CheckMetadata::new(name, CheckCategory::Custom, severity).with_tag("test"),
            })
        }
    }

    #[async_trait]
    impl Check for TestCheck {
        fn name(&self) -> &str {
            &self.metadata.name
        }

        fn metadata(&self) -> &CheckMetadata {
            &self.metadata
        }

        async fn run(&self, _ctx: &CheckContext) -> CheckResult {
            Ok(vec![])
        }
    }

    fn registry() -> CheckRegistry {
        let mut registry = CheckRegistry::new();
        registry.register("b", || TestCheck::named("b", Severity::Low));
        registry.register("a", || TestCheck::named("a", Severity::High));
        registry.register("c", || TestCheck::named("c", Severity::Medium));
        registry
    }

    fn names(checks: &[Arc<dyn Check>]) -> Vec<&str> {
        checks.iter().map(|c| c.name()).collect()
    }

    fn sel(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_all_in_registration_order() {
        let registry = registry();
        assert_eq!(names(&registry.resolve(&[]).unwrap()), vec!["b", "a", "c"]);
        assert_eq!(names(&registry.resolve(&sel(&["all"])).unwrap()), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_resolve_keeps_requested_order() {
        let registry = registry();
        for _ in 0..10 {
            let checks = registry.resolve(&sel(&["a", "b"])).unwrap();
            assert_eq!(names(&checks), vec!["a", "b"]);
        }
        let checks = registry.resolve(&sel(&["c", "a", "c"])).unwrap();
        assert_eq!(names(&checks), vec!["c", "a"]);
    }

    #[test]
    fn test_unknown_check_fails_fast() {
        let err = registry().resolve(&sel(&["a", "bogus_checks"])).err().expect("expected resolve to fail");
        assert!(matches!(err, Error::UnknownCheck { ref name } if name == "bogus_checks"));
    }

    #[test]
    fn test_unknown_name_next_to_all_fails() {
        let err = registry().resolve(&sel(&["all", "bogus"])).err().expect("expected resolve to fail");
        assert!(matches!(err, Error::UnknownCheck { ref name } if name == "bogus"));

        assert_eq!(names(&registry().resolve(&sel(&["a", "ALL"])).unwrap()), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_exclusions() {
        let registry = registry();
        let checks = registry.resolve_excluding(&[], &sel(&["a"])).unwrap();
        assert_eq!(names(&checks), vec!["b", "c"]);

        assert!(matches!(
            registry.resolve_excluding(&[], &sel(&["nope"])),
            Err(Error::UnknownCheck { .. })
        ));
    }

    #[test]
    fn test_reregistration_keeps_position() {
        let mut registry = registry();
        registry.register("b", || TestCheck::named("b", Severity::Critical));

        assert_eq!(registry.names(), vec!["b", "a", "c"]);
        assert_eq!(registry.get_metadata("b").unwrap().severity, Severity::Critical);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_filters() {
        let registry = registry();
        assert_eq!(registry.by_min_severity(Severity::Medium), vec!["a", "c"]);
        assert_eq!(registry.by_tag("TEST").len(), 3);
        assert!(registry.by_category(CheckCategory::Headers).is_empty());
    }

    #[test]
    fn test_builtin_order() {
        let registry = CheckRegistry::with_builtin();
        assert_eq!(
            registry.names(),
            vec![
                "header_checks",
                "server_info_checks",
                "file_checks",
                "http_method_checks",
                "cookie_checks",
                "misc_checks",
            ]
        );
        assert!(registry.contains("cookie_checks"));
        assert_eq!(registry.by_category(CheckCategory::Files), vec!["file_checks"]);
    }
}
