//! WebProbe - Web server misconfiguration scanner
//!
//! This is the main entry point for the `webprobe` binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webprobe_checks::{register_checks_from_dir, CheckRegistry};
use webprobe_common::{init_logging_with_config, seconds_to_ms, Config, LogFormat};
use webprobe_core::{ScanResult, Target};
use webprobe_scanner::Scanner;
use webprobe_webapp::ScanConfig;

/// WebProbe web server scanner
#[derive(Parser, Debug)]
#[command(name = "webprobe")]
#[command(version)]
#[command(about = "Probe a web server for common misconfigurations", long_about = None)]
struct Args {
    /// Target URL (http:// is assumed when no scheme is given)
    #[arg(required_unless_present = "list_checks")]
    url: Option<String>,

    /// Comma separated checks to run, or "all"
    #[arg(long, value_delimiter = ',')]
    checks: Vec<String>,

    /// Comma separated checks to skip
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Number of checks run concurrently
    #[arg(short, long)]
    threads: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Delay between requests in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Proxy URL (e.g. http://127.0.0.1:8080)
    #[arg(long)]
    proxy: Option<String>,

    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Extra request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Do not verify TLS certificates
    #[arg(long)]
    no_verify_tls: bool,

    /// Abort the whole scan after this many seconds
    #[arg(long)]
    scan_timeout: Option<f64>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of YAML probe checks to load after the built-in checks
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// List available checks and exit
    #[arg(long)]
    list_checks: bool,

    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = config.merge_env()?;

    // Initialize logging
    let mut log_config = config.logging.to_log_config().verbosity(args.verbose, args.quiet);
    if let Some(format) = args.log_format {
        log_config = log_config.format(format);
    }
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("logging already initialised: {}", e);
    }

    let mut registry = CheckRegistry::with_builtin();
    let plugin_dir = args
        .plugin_dir
        .clone()
        .or_else(|| config.checks.plugin_dir.as_ref().map(PathBuf::from));
    if let Some(dir) = plugin_dir {
        let loaded = register_checks_from_dir(&mut registry, &dir)
            .with_context(|| format!("loading plugin checks from {}", dir.display()))?;
        info!("Loaded {} plugin checks from {}", loaded, dir.display());
    }

    if args.list_checks {
        for meta in registry.metadata() {
            println!(
                "{:<24} {:<12} {:<8} {}",
                meta.name,
                meta.category.to_string(),
                meta.severity.to_string(),
                meta.description
            );
        }
        return Ok(());
    }

    let url = args.url.as_deref().context("a target URL is required")?;
    let target = Target::parse(url).with_context(|| format!("invalid target '{}'", url))?;
    let scan_config = apply_args(config.to_scan_config()?, &args)?;

    info!("WebProbe {} starting", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping scan");
            interrupt.cancel();
        }
    });

    let scanner = Scanner::new(registry);
    let result = scanner.start_scan(&target, &scan_config, None, cancel).await?;

    log_summary(&result);
    write_result(&result, args.output.as_ref())?;
    Ok(())
}

/// Command line flags override file and environment settings
fn apply_args(mut config: ScanConfig, args: &Args) -> Result<ScanConfig> {
    if !args.checks.is_empty() {
        config = config.with_checks(args.checks.iter().map(|c| c.trim().to_string()));
    }
    if !args.exclude.is_empty() {
        config = config.with_excluded(args.exclude.iter().map(|c| c.trim().to_string()));
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout_ms(seconds_to_ms("--timeout", timeout)?);
    }
    if let Some(delay) = args.delay {
        config = config.with_delay_ms(seconds_to_ms("--delay", delay)?);
    }
    if let Some(proxy) = &args.proxy {
        config = config.with_proxy(proxy);
    }
    if let Some(user_agent) = &args.user_agent {
        config = config.with_user_agent(user_agent);
    }
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header '{}' is not 'Name: value'", header))?;
        config = config.with_header(name.trim(), value.trim());
    }
    if args.no_verify_tls {
        config = config.with_verify_tls(false);
    }
    if let Some(limit) = args.scan_timeout {
        config = config.with_scan_timeout_ms(seconds_to_ms("--scan-timeout", limit)?);
    }

    config.validate()?;
    Ok(config)
}

fn log_summary(result: &ScanResult) {
    info!(
        "Scan {} in {:.1}s: {} findings from {} checks",
        result.status(),
        result.duration().as_secs_f64(),
        result.findings().len(),
        result.checks_run().len()
    );
    for (severity, count) in result.severity_counts().iter() {
        info!("  {}: {}", severity, count);
    }
    for error in result.errors() {
        warn!("Check error: {}", error);
    }
    if let Some(reason) = result.cancel_reason() {
        warn!("Scan cancelled: {}", reason);
    }
}

fn write_result(result: &ScanResult, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
