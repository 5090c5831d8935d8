//! Scan orchestrator
//!
//! A scan moves `Idle -> Running -> {Completed, Cancelled, Failed}`:
//!
//! 1. The configuration is validated and the check selection resolved. Any
//!    failure here is returned before a single request is sent.
//! 2. The target is probed once (preflight). A connection, TLS or timeout
//!    failure there fails the scan without a result.
//! 3. Checks are dispatched in resolution order to at most `threads`
//!    concurrent workers. Findings are aggregated as workers finish, so
//!    their order in the result is not stable across runs.
//! 4. On cancellation (caller token or global scan timeout) dispatch stops,
//!    in-flight checks get the grace period to return and the aggregate is
//!    sealed as `Cancelled`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use webprobe_checks::CheckRegistry;
use webprobe_core::{
    CheckError, Error, ProbeError, ProgressEvent, Result, ScanAggregate, ScanResult, SealInfo, Target,
};
use webprobe_webapp::{Check, CheckContext, ProbeClient, ScanConfig, Transport};

/// Runs scans against single targets.
///
/// Holds no per-scan state, so one `Scanner` can run any number of scans,
/// concurrently or one after another.
pub struct Scanner {
    registry: CheckRegistry,
    transport: Option<Arc<dyn Transport>>,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("registry", &self.registry)
            .field("custom_transport", &self.transport.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(CheckRegistry::with_builtin())
    }
}

impl Scanner {
    pub fn new(registry: CheckRegistry) -> Self {
        Self {
            registry,
            transport: None,
            progress: None,
        }
    }

    /// Send every request through `transport` instead of reqwest
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Emit check lifecycle events on `sender`.
    ///
    /// A closed receiver is ignored.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Run one scan.
    ///
    /// `checks` overrides the selection in `config` when given. The only
    /// errors returned are validation, unknown check and orchestrator
    /// failures; everything that goes wrong inside a check ends up in
    /// [`ScanResult::errors`].
    pub async fn start_scan(
        &self,
        target: &Target,
        config: &ScanConfig,
        checks: Option<&[String]>,
        cancel: CancellationToken,
    ) -> Result<ScanResult> {
        config.validate()?;

        let selection = match checks {
            Some(names) => names.to_vec(),
            None => config.selected_checks(),
        };
        let resolved = self.registry.resolve_excluding(&selection, &config.excluded_checks)?;
        info!(
            "Starting scan of {} with {} checks ({} threads)",
            target,
            resolved.len(),
            config.threads
        );

        // Child token: a scan timeout must not cancel the caller's token
        let scan_token = cancel.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = config
            .scan_timeout()
            .map(|limit| spawn_deadline(limit, scan_token.clone(), Arc::clone(&timed_out)));

        let outcome = self
            .run(target, config, resolved, &scan_token, &timed_out)
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        outcome
    }

    async fn run(
        &self,
        target: &Target,
        config: &ScanConfig,
        checks: Vec<Arc<dyn Check>>,
        scan_token: &CancellationToken,
        timed_out: &AtomicBool,
    ) -> Result<ScanResult> {
        let client = Arc::new(self.build_client(target, config, scan_token.clone())?);
        let aggregate = Arc::new(ScanAggregate::new(target.clone()));
        let mut queue: VecDeque<Arc<dyn Check>> = checks.into();

        if config.preflight {
            match client.is_reachable().await {
                Ok(()) => debug!("Preflight request to {} succeeded", target),
                Err(ProbeError::Cancelled) => {}
                Err(e) if e.is_unreachable() => {
                    error!("Target {} is unreachable: {}", target, e);
                    return Err(Error::TargetUnreachable {
                        target: target.to_string(),
                        reason: e.to_string(),
                    });
                }
                // The server answered; let the checks deal with it
                Err(e) => debug!("Preflight request to {} failed, continuing: {}", target, e),
            }
        }

        let ctx = CheckContext::from_shared(Arc::clone(&client), target.clone(), Arc::new(config.clone()));
        let semaphore = Arc::new(Semaphore::new(config.threads));
        let mut workers = JoinSet::new();

        while let Some(check) = queue.pop_front() {
            let permit = tokio::select! {
                biased;
                _ = scan_token.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => Some(
                    permit.map_err(|e| Error::Orchestrator(format!("worker pool closed: {}", e)))?,
                ),
            };
            let Some(permit) = permit else {
                queue.push_front(check);
                break;
            };
            if scan_token.is_cancelled() {
                queue.push_front(check);
                break;
            }

            aggregate.record_dispatch(check.name());
            self.emit(ProgressEvent::started(check.name()));
            workers.spawn(run_check(
                check,
                ctx.clone(),
                Arc::clone(&aggregate),
                self.progress.clone(),
                permit,
            ));
        }

        let drained = tokio::select! {
            _ = drain(&mut workers) => true,
            _ = scan_token.cancelled() => false,
        };

        if !drained {
            let grace = config.grace_period();
            debug!("Waiting up to {:?} for {} in-flight checks", grace, workers.len());
            if tokio::time::timeout(grace, drain(&mut workers)).await.is_err() {
                warn!(
                    "Abandoning checks still running after grace period: {}",
                    aggregate.in_flight().join(", ")
                );
                workers.abort_all();
            }
        }

        let skipped: Vec<String> = queue.iter().map(|c| c.name().to_string()).collect();
        let cancelled = !drained || !skipped.is_empty();
        let info = if cancelled {
            let reason = if timed_out.load(Ordering::SeqCst) {
                format!("scan timeout of {} ms elapsed", config.scan_timeout_ms.unwrap_or_default())
            } else {
                String::from("scan cancelled")
            };
            warn!("Scan of {} cancelled ({}), {} checks skipped", target, reason, skipped.len());
            SealInfo::cancelled(reason, skipped, client.requests_sent())
        } else {
            SealInfo::completed(client.requests_sent())
        };

        let result = aggregate
            .seal(info)
            .ok_or_else(|| Error::Internal(String::from("scan result sealed twice")))?;

        info!(
            "Scan of {} {} in {:?}: {} findings, {} check errors, {} requests",
            target,
            result.status(),
            result.duration(),
            result.findings().len(),
            result.errors().len(),
            result.requests_sent()
        );
        Ok(result)
    }

    fn build_client(&self, target: &Target, config: &ScanConfig, token: CancellationToken) -> Result<ProbeClient> {
        match &self.transport {
            Some(transport) => Ok(ProbeClient::with_transport(target, config, Arc::clone(transport), token)),
            None => ProbeClient::new(target, config, token)
                .map_err(|e| Error::Orchestrator(format!("failed to build HTTP client: {}", e))),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }
}

fn spawn_deadline(limit: std::time::Duration, token: CancellationToken, timed_out: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(limit) => {
                timed_out.store(true, Ordering::SeqCst);
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!("check worker panicked outside its check: {}", e);
            }
        }
    }
}

/// Aborts the wrapped task when dropped, so abandoning a worker also stops
/// the check it is waiting on.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_check(
    check: Arc<dyn Check>,
    ctx: CheckContext,
    aggregate: Arc<ScanAggregate>,
    progress: Option<UnboundedSender<ProgressEvent>>,
    _permit: OwnedSemaphorePermit,
) {
    let name = check.name().to_string();
    let span = info_span!("check", check = %name);

    // The check runs in its own task so a panic surfaces as a JoinError
    let mut task = AbortOnDrop(tokio::spawn(
        async move { check.run(&ctx).await }.instrument(span),
    ));

    let event = match (&mut task.0).await {
        Ok(Ok(findings)) => {
            let total = findings.len();
            let kept = aggregate.record_findings(findings);
            info!("{} finished: {} findings ({} new)", name, total, kept);
            ProgressEvent::completed(&name, kept)
        }
        Ok(Err(e)) => {
            warn!("{} failed: {}", name, e);
            aggregate.record_error(CheckError::new(&name, e.to_string()));
            ProgressEvent::failed(&name, e.to_string())
        }
        Err(e) => {
            let message = join_failure(e);
            error!("{} {}", name, message);
            aggregate.record_error(CheckError::new(&name, &message));
            ProgressEvent::failed(&name, message)
        }
    };

    aggregate.record_finished(&name);
    if let Some(sender) = progress {
        let _ = sender.send(event);
    }
}

fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return String::from("aborted");
    }
    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic payload"));
    format!("panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};
    use webprobe_core::{Finding, ScanStatus, Severity};
    use webprobe_webapp::testing::{ScriptedResponse, ScriptedTransport};
    use webprobe_webapp::{CheckCategory, CheckMetadata, CheckResult};

    #[derive(Clone, Copy)]
    enum Behavior {
        /// One finding per path, attributed to `finding_owner`
        Probe(&'static [&'static str]),
        Fail,
        Panic,
        /// Keep probing until cancelled
        Endless,
        /// Sleep without looking at the cancellation token
        Stuck,
    }

    struct TestCheck {
        metadata: CheckMetadata,
        behavior: Behavior,
        finding_owner: String,
    }

    impl TestCheck {
        fn new(name: &str, behavior: Behavior) -> Self {
            Self {
                metadata: CheckMetadata::new(name, CheckCategory::Custom, Severity::Low),
                behavior,
                finding_owner: name.to_string(),
            }
        }

        fn owned_by(mut self, owner: &str) -> Self {
            self.finding_owner = owner.to_string();
            self
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

        async fn run(&self, ctx: &CheckContext) -> CheckResult {
            match self.behavior {
                Behavior::Probe(paths) => {
                    let mut findings = Vec::new();
                    for path in paths {
                        let response = ctx.get(path).await?;
                        findings.push(
                            Finding::builder(&self.finding_owner, ctx.url_for(path))
                                .description(format!("status {}", response.status))
                                .severity(Severity::Low)
                                .build(),
                        );
                    }
                    Ok(findings)
                }
                Behavior::Fail => Err(Error::CheckFailed {
                    check: self.name().to_string(),
                    message: String::from("boom"),
                }),
                Behavior::Panic => panic!("check exploded"),
                Behavior::Endless => {
                    let mut findings = Vec::new();
                    let mut n = 0;
                    while !ctx.is_cancelled() {
                        let path = format!("/page{}", n);
                        if ctx.try_get(&path).await.is_some() {
                            findings.push(
                                Finding::builder(self.name(), ctx.url_for(&path))
                                    .description("page")
                                    .build(),
                            );
                        }
                        n += 1;
                    }
                    Ok(findings)
                }
                Behavior::Stuck => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(vec![])
                }
            }
        }
    }

    fn registry(checks: Vec<TestCheck>) -> CheckRegistry {
        let mut registry = CheckRegistry::new();
        for check in checks {
            registry.register_check(Arc::new(check));
        }
        registry
    }

    fn config() -> ScanConfig {
        ScanConfig::default().with_delay_ms(0).with_preflight(false)
    }

    fn target() -> Target {
        Target::parse("http://example.com").unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn scanner(registry: CheckRegistry, transport: &Arc<ScriptedTransport>) -> Scanner {
        Scanner::new(registry).with_transport(transport.clone())
    }

    #[tokio::test]
    async fn test_dispatch_order_follows_selection() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = scanner(
            registry(vec![
                TestCheck::new("a", Behavior::Probe(&["/a"])),
                TestCheck::new("b", Behavior::Probe(&["/b"])),
                TestCheck::new("c", Behavior::Probe(&["/c"])),
            ]),
            &transport,
        );

        for _ in 0..5 {
            let result = scanner
                .start_scan(&target(), &config(), Some(&names(&["c", "a"])), CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(result.checks_run(), names(&["c", "a"]).as_slice());
        }

        let result = scanner
            .start_scan(&target(), &config(), None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.checks_run(), names(&["a", "b", "c"]).as_slice());
    }

    #[tokio::test]
    async fn test_failing_checks_are_isolated() {
        let transport = Arc::new(ScriptedTransport::new().route("/ok", 200, "fine"));
        let scanner = scanner(
            registry(vec![
                TestCheck::new("failing", Behavior::Fail),
                TestCheck::new("panicking", Behavior::Panic),
                TestCheck::new("healthy", Behavior::Probe(&["/ok"])),
            ]),
            &transport,
        );

        let result = scanner
            .start_scan(&target(), &config(), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status(), ScanStatus::Completed);
        assert_eq!(result.findings_for("healthy").count(), 1);
        assert_eq!(result.errors().len(), 2);
        let failing: Vec<_> = result.errors().iter().filter(|e| e.check_name == "failing").collect();
        assert_eq!(failing.len(), 1);
        let panicked = result
            .errors()
            .iter()
            .find(|e| e.check_name == "panicking")
            .unwrap();
        assert!(panicked.message.contains("check exploded"));
    }

    #[tokio::test]
    async fn test_duplicate_findings_collapse() {
        let transport = Arc::new(ScriptedTransport::new().route("/same", 200, ""));
        let scanner = scanner(
            registry(vec![
                TestCheck::new("first", Behavior::Probe(&["/same"])).owned_by("shared"),
                TestCheck::new("second", Behavior::Probe(&["/same"])).owned_by("shared"),
            ]),
            &transport,
        );

        let result = scanner
            .start_scan(&target(), &config(), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.findings().len(), 1);
        assert_eq!(result.severity_counts().total(), 1);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_spaces_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = scanner(
            registry(vec![TestCheck::new(
                "paced",
                Behavior::Probe(&["/1", "/2", "/3", "/4", "/5"]),
            )]),
            &transport,
        );
        let config = config().with_threads(1).with_delay_ms(40);

        let started = Instant::now();
        let result = scanner
            .start_scan(&target(), &config, None, CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(4 * 40));
        assert_eq!(result.requests_sent(), 5);
    }

    #[tokio::test]
    async fn test_finding_count_is_invariant_to_threads() {
        static PATHS: [&str; 20] = [
            "/0", "/1", "/2", "/3", "/4", "/5", "/6", "/7", "/8", "/9", "/10", "/11", "/12", "/13", "/14", "/15",
            "/16", "/17", "/18", "/19",
        ];
        let checks = PATHS
            .iter()
            .enumerate()
            .map(|(i, path)| TestCheck::new(&format!("check_{}", i), Behavior::Probe(std::slice::from_ref(path))))
            .collect();
        let transport = Arc::new(ScriptedTransport::new().latency(Duration::from_millis(2)));
        let scanner = scanner(registry(checks), &transport);

        for threads in [1, 10] {
            for _ in 0..3 {
                let result = scanner
                    .start_scan(&target(), &config().with_threads(threads), None, CancellationToken::new())
                    .await
                    .unwrap();
                assert_eq!(result.findings().len(), 20);
                assert_eq!(result.checks_run().len(), 20);
                assert!(result.errors().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_seals_partial_result() {
        let transport = Arc::new(ScriptedTransport::new().latency(Duration::from_millis(10)));
        let scanner = scanner(
            registry(vec![
                TestCheck::new("endless", Behavior::Endless),
                TestCheck::new("later", Behavior::Probe(&["/later"])),
            ]),
            &transport,
        );
        let config = config().with_threads(1).with_grace_period_ms(500);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = scanner.start_scan(&target(), &config, None, cancel).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result.is_cancelled());
        assert_eq!(result.cancel_reason(), Some("scan cancelled"));
        assert_eq!(result.skipped_checks(), names(&["later"]).as_slice());
        assert!(result.findings().iter().all(|f| f.check_name == "endless"));
        assert!(result.findings().len() < 100);
    }

    #[tokio::test]
    async fn test_scan_timeout_cancels() {
        let transport = Arc::new(ScriptedTransport::new().latency(Duration::from_millis(5)));
        let scanner = scanner(registry(vec![TestCheck::new("endless", Behavior::Endless)]), &transport);
        let cancel = CancellationToken::new();

        let result = scanner
            .start_scan(&target(), &config().with_scan_timeout_ms(80), None, cancel.clone())
            .await
            .unwrap();

        assert_eq!(result.status(), ScanStatus::Cancelled);
        assert!(result.cancel_reason().unwrap().contains("timeout"));
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_stuck_check_is_abandoned_after_grace_period() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = scanner(registry(vec![TestCheck::new("stuck", Behavior::Stuck)]), &transport);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = scanner
            .start_scan(&target(), &config().with_grace_period_ms(50), None, cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(result.is_cancelled());
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].message.contains("abandoned"));
    }

    #[tokio::test]
    async fn test_missing_header_scenario() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "/",
            ScriptedResponse::new(200).header("X-Content-Type-Options", "nosniff"),
        ));
        let scanner = Scanner::default().with_transport(transport.clone());
        let config = ScanConfig::default().with_delay_ms(0);

        let result = scanner
            .start_scan(&target(), &config, Some(&names(&["header_checks"])), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status(), ScanStatus::Completed);
        assert_eq!(result.findings().len(), 1);
        let finding = &result.findings()[0];
        assert_eq!(finding.check_name, "header_checks");
        assert_eq!(finding.severity, Severity::Medium);
        assert!(finding.description.contains("X-Frame-Options"));
        assert_eq!(
            serde_json::to_value(result.severity_counts()).unwrap(),
            serde_json::json!({"medium": 1})
        );
    }

    #[tokio::test]
    async fn test_unknown_check_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = Scanner::default().with_transport(transport.clone());

        let err = scanner
            .start_scan(
                &target(),
                &ScanConfig::default(),
                Some(&names(&["bogus_checks"])),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownCheck { ref name } if name == "bogus_checks"));
        assert!(err.is_fatal());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = Scanner::default().with_transport(transport.clone());

        let err = scanner
            .start_scan(&target(), &ScanConfig::default().with_threads(0), None, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_scan() {
        let transport = Arc::new(ScriptedTransport::new().fail(
            "/",
            ProbeError::ConnectionFailed {
                url: "http://example.com/".into(),
                message: "connection refused".into(),
            },
        ));
        let scanner = scanner(registry(vec![TestCheck::new("a", Behavior::Probe(&["/a"]))]), &transport);

        let err = scanner
            .start_scan(&target(), &config().with_preflight(true), None, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TargetUnreachable { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_answering_target_with_bad_response_still_scans() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(
                    "/",
                    ProbeError::Request {
                        url: "http://example.com/".into(),
                        message: "error decoding response body".into(),
                    },
                )
                .route("/a", 200, "ok"),
        );
        let scanner = scanner(registry(vec![TestCheck::new("a", Behavior::Probe(&["/a"]))]), &transport);

        let result = scanner
            .start_scan(&target(), &config().with_preflight(true), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status(), ScanStatus::Completed);
        assert_eq!(result.findings_for("a").count(), 1);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_check_next_to_all_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let scanner = Scanner::default().with_transport(transport.clone());

        let err = scanner
            .start_scan(
                &target(),
                &ScanConfig::default(),
                Some(&names(&["all", "bogus_checks"])),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCheck { ref name } if name == "bogus_checks"));

        let config = ScanConfig::default().with_checks(["all", "bogus_checks"]);
        let err = scanner
            .start_scan(&target(), &config, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCheck { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let transport = Arc::new(ScriptedTransport::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let scanner = scanner(
            registry(vec![
                TestCheck::new("ok", Behavior::Probe(&["/x"])),
                TestCheck::new("bad", Behavior::Fail),
            ]),
            &transport,
        )
        .with_progress(tx);

        scanner
            .start_scan(&target(), &config().with_threads(1), None, CancellationToken::new())
            .await
            .unwrap();
        drop(scanner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 4);
        assert!(events.contains(&ProgressEvent::started("ok")));
        assert!(events.contains(&ProgressEvent::completed("ok", 1)));
        assert!(events
            .iter()
            .any(|e| e.check_name == "bad" && e.is_terminal()));
    }
}
