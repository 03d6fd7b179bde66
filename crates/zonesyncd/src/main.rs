// # zonesyncd - zone reconciliation runner
//
// This binary is a THIN integration layer:
// - DO NOT add DNS, diff, or retry logic here; it lives in zonesync-core
// - Provider specifics live in the provider crates
// - Configuration is via environment variables ONLY
//
// The zonesyncd binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Loading the desired zone files
// 3. Registering providers and building the remote client
// 4. Running one plan or apply pass per zone and reporting the outcome
//
// SIGINT/SIGTERM stops every zone between changes; the partial reports are
// printed and the exit code is 3.
//
// ## Configuration
//
// ### Provider
// - `ZONESYNC_PROVIDER_TYPE`: Provider type (gandi)
// - `ZONESYNC_TOKEN`: API token
// - `ZONESYNC_PER_PAGE`: Listing page size (optional)
// - `ZONESYNC_ENDPOINT`: API base URL override (optional)
//
// ### Zones
// - `ZONESYNC_ZONES`: Comma-separated `zone=path` pairs
// - `ZONESYNC_EXCLUDE`: Comma-separated `name/TYPE` records to leave alone
//
// ### Run
// - `ZONESYNC_MODE`: `plan` (default) or `apply`
// - `ZONESYNC_MAX_ATTEMPTS`: Attempts per remote call
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ZONESYNC_PROVIDER_TYPE=gandi
// export ZONESYNC_TOKEN=your_token
// export ZONESYNC_ZONES=example.com=/etc/zonesync/example.com.json
// export ZONESYNC_EXCLUDE=@/NS
// export ZONESYNC_MODE=apply
//
// zonesyncd
// ```

mod desired;

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::{
    ExclusionConfig, Mode, ProviderConfig, ProviderRegistry, ReconcileEvent, Reconciler,
    RemoteClient, SyncConfig, ZoneConfig, ZoneReport,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Every zone reconciled (or planned)
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: At least one zone failed to fetch or apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
    ZoneFailed = 3,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    sync: SyncConfig,
    mode: Mode,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider_type = lookup("ZONESYNC_PROVIDER_TYPE").unwrap_or_else(|| "gandi".to_string());
        let provider = match provider_type.as_str() {
            "gandi" => ProviderConfig::Gandi {
                token: lookup("ZONESYNC_TOKEN").context(
                    "ZONESYNC_TOKEN is required. Set it via: export ZONESYNC_TOKEN=your_token",
                )?,
                per_page: lookup("ZONESYNC_PER_PAGE")
                    .map(|s| s.trim().parse())
                    .transpose()
                    .context("ZONESYNC_PER_PAGE must be a positive integer")?,
                endpoint: lookup("ZONESYNC_ENDPOINT").filter(|s| !s.is_empty()),
            },
            other => anyhow::bail!(
                "ZONESYNC_PROVIDER_TYPE '{}' is not supported. Supported providers: gandi",
                other
            ),
        };

        let mut sync = SyncConfig::new(provider);
        sync.zones = split_list(lookup("ZONESYNC_ZONES"))
            .map(|pair| {
                let (name, source) = pair.split_once('=').with_context(|| {
                    format!("ZONESYNC_ZONES entries must be zone=path. Got: {pair}")
                })?;
                Ok(ZoneConfig {
                    name: name.trim().to_string(),
                    source: source.trim().to_string(),
                })
            })
            .collect::<Result<_>>()?;
        sync.exclusions = split_list(lookup("ZONESYNC_EXCLUDE"))
            .map(|s| s.parse::<ExclusionConfig>())
            .collect::<zonesync_core::Result<_>>()
            .context("ZONESYNC_EXCLUDE must list name/TYPE pairs")?;
        if let Some(attempts) = lookup("ZONESYNC_MAX_ATTEMPTS") {
            sync.retry.max_attempts = attempts
                .trim()
                .parse()
                .context("ZONESYNC_MAX_ATTEMPTS must be an integer")?;
        }

        let mode = match lookup("ZONESYNC_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("plan") => Mode::Plan,
            Some("apply") => Mode::Apply,
            Some(other) => anyhow::bail!(
                "ZONESYNC_MODE '{}' is not valid. Valid modes: plan, apply",
                other
            ),
        };

        Ok(Self {
            sync,
            mode,
            log_level: lookup("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.sync.zones.is_empty() {
            anyhow::bail!(
                "ZONESYNC_ZONES must contain at least one zone. \
                Set it via: export ZONESYNC_ZONES=example.com=/path/to/example.com.json"
            );
        }

        self.sync.validate()?;

        if self.sync.retry.max_attempts > 10 {
            anyhow::bail!(
                "ZONESYNC_MAX_ATTEMPTS must be between 1 and 10. Got: {}",
                self.sync.retry.max_attempts
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn split_list(value: Option<String>) -> impl Iterator<Item = String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .into_iter()
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd");
    info!("Configuration loaded: {} zone(s), mode {:?}", config.sync.zones.len(), config.mode);

    let zones = match load_zones(&config.sync.zones) {
        Ok(zones) => zones,
        Err(e) => {
            error!("{:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(config, zones).await {
            Ok(code) => code,
            Err(e) => {
                error!("zonesyncd error: {:#}", e);
                SyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Read every desired zone file before touching the provider
fn load_zones(zones: &[ZoneConfig]) -> Result<Vec<(String, Vec<zonesync_core::Record>)>> {
    zones
        .iter()
        .map(|zone| Ok((zone.name.clone(), desired::load(&zone.source)?)))
        .collect()
}

/// Build the client, reconcile every zone and map the reports to an exit code
async fn run(
    config: Config,
    zones: Vec<(String, Vec<zonesync_core::Record>)>,
) -> Result<SyncExitCode> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "gandi")]
    {
        info!("Registering Gandi provider");
        zonesync_provider_gandi::register(&registry)?;
    }

    let client = match registry.create_client(&config.sync.provider, &config.sync.retry) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create {} client: {}", config.sync.provider.type_name(), e);
            return Ok(SyncExitCode::ConfigError);
        }
    };

    match client.list_zones().await {
        Ok(known) => {
            for zone in missing_zones(&known, zones.iter().map(|(zone, _)| zone.as_str())) {
                warn!("{} is not managed by this account; apply will try to create it", zone);
            }
        }
        Err(e) => warn!("Cannot list zones: {}", e),
    }

    let (reconciler, mut events) = Reconciler::new(client, &config.sync);
    let reconciler = Arc::new(reconciler);

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    // Interrupts stop zones between changes; in-flight requests complete
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reports = {
        let run_all = reconciler.reconcile_all(zones, config.mode, Some(cancel_rx));
        tokio::pin!(run_all);

        tokio::select! {
            reports = &mut run_all => reports,
            signal = wait_for_interrupt() => {
                match signal {
                    Ok(signal) => {
                        warn!("Received {}, stopping after in-flight changes", signal);
                        if cancel_tx.send(true).is_err() {
                            warn!("All zones already finished");
                        }
                    }
                    Err(e) => error!("{:#}; interrupts will not be handled", e),
                }
                run_all.await
            }
        }
    };

    drop(reconciler);
    if let Err(e) = event_logger.await {
        warn!("Event logger task failed: {}", e);
    }

    Ok(print_reports(&reports))
}

/// Configured zones absent from the provider's (sorted) zone list
///
/// An empty list means the provider cannot enumerate zones, not that none exist.
fn missing_zones<'a>(known: &[String], configured: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    if known.is_empty() {
        return Vec::new();
    }
    configured
        .filter(|zone| {
            let name = zone.trim_end_matches('.').to_ascii_lowercase();
            known.binary_search(&name).is_err()
        })
        .collect()
}

fn log_event(event: &ReconcileEvent) {
    match event {
        ReconcileEvent::ChangeApplied { zone, change } => info!("{}: applied {}", zone, change),
        ReconcileEvent::ChangeFailed {
            zone,
            change,
            error,
        } => warn!("{}: failed {}: {}", zone, change, error),
        other => tracing::debug!("{:?}", other),
    }
}

/// Print each zone's plan and outcome to stdout
fn print_reports(reports: &[ZoneReport]) -> SyncExitCode {
    let mut code = SyncExitCode::Success;
    for report in reports {
        for warning in &report.warnings {
            println!("{}: warning: {}", report.zone, warning);
        }
        if !report.plan.is_empty() {
            println!("{}", report.plan);
        }
        println!("{}", report);
        if !report.is_success() {
            code = SyncExitCode::ZoneFailed;
        }
    }
    code
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_interrupt() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_interrupt() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
