//! Configuration file loading
//!
//! The configuration is a TOML file found with priority:
//! 1. Explicit path (`--config`)
//! 2. Environment variable (`FLEETMAP_CONFIG`)
//! 3. Config file (`~/.config/fleetmap/config.toml`)

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::anomaly::{compare_versions, AnomalyOptions, RuleToggles, Thresholds};
use crate::collector::{Backoff, CollectOptions, RetryPolicy, DEFAULT_MAX_WORKERS};
use crate::inventory::AnalysisOptions;
use crate::model::{Credentials, Target, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::session::CategoryToggles;
use crate::topology::{StationPolicy, TopologyOptions};

/// Environment variable name for the config path override
pub const ENV_CONFIG_PATH: &str = "FLEETMAP_CONFIG";

/// A password read from configuration. Never printed.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Connection settings shared by every target unless overridden.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub username: String,
    pub password: Secret,
    pub port: u16,
    pub timeout_secs: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: Secret::default(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetConfig {
    #[serde(alias = "ip")]
    pub address: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub port: Option<u16>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Poll devices concurrently; `false` polls one at a time
    pub parallel: bool,
    pub max_workers: usize,
    /// Total attempts per device, including the first
    pub retry_attempts: u32,
    pub retry_delay_secs: f64,
    pub backoff: Backoff,
    pub max_retry_delay_secs: f64,
    pub collect: CategoryToggles,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            parallel: true,
            max_workers: DEFAULT_MAX_WORKERS,
            retry_attempts: retry.max_attempts,
            retry_delay_secs: retry.delay.as_secs_f64(),
            backoff: retry.backoff,
            max_retry_delay_secs: retry.max_delay.as_secs_f64(),
            collect: CategoryToggles::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub analyze_links: bool,
    pub detect_anomalies: bool,
    /// Minimum link confidence (0.0 - 1.0) to report
    pub min_link_quality: f64,
    pub station_policy: StationPolicy,
    pub max_cpu_load: f64,
    pub max_memory_usage: f64,
    pub min_firmware_version: String,
    pub max_inactive_pppoe_ratio: f64,
    pub rules: RuleToggles,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            enabled: true,
            analyze_links: true,
            detect_anomalies: true,
            min_link_quality: 0.0,
            station_policy: StationPolicy::default(),
            max_cpu_load: thresholds.max_cpu_load,
            max_memory_usage: thresholds.max_memory_usage,
            min_firmware_version: thresholds.min_firmware_version,
            max_inactive_pppoe_ratio: thresholds.max_inactive_pppoe_ratio,
            rules: RuleToggles::default(),
        }
    }
}

/// Where device data comes from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of per-device JSON captures (`<address>.json`)
    pub replay_dir: Option<PathBuf>,
}

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: DefaultsConfig,
    pub targets: Vec<TargetConfig>,
    pub collection: CollectionConfig,
    pub analysis: AnalysisConfig,
    pub source: SourceConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.targets.is_empty(), "no targets configured");
        for (i, target) in self.targets.iter().enumerate() {
            ensure!(
                !target.address.trim().is_empty(),
                "target #{} has an empty address",
                i + 1
            );
            if let Some(timeout) = target.timeout_secs {
                ensure!(
                    timeout.is_finite() && timeout > 0.0,
                    "target {}: timeout_secs must be positive",
                    target.address
                );
            }
        }
        ensure!(
            self.defaults.timeout_secs.is_finite() && self.defaults.timeout_secs > 0.0,
            "defaults.timeout_secs must be positive"
        );

        let c = &self.collection;
        ensure!(c.max_workers >= 1, "collection.max_workers must be at least 1");
        ensure!(c.retry_attempts >= 1, "collection.retry_attempts must be at least 1");
        ensure!(
            c.retry_delay_secs.is_finite() && c.retry_delay_secs >= 0.0,
            "collection.retry_delay_secs must not be negative"
        );
        ensure!(
            c.max_retry_delay_secs.is_finite() && c.max_retry_delay_secs >= c.retry_delay_secs,
            "collection.max_retry_delay_secs must be at least retry_delay_secs"
        );

        let a = &self.analysis;
        ensure!(
            (0.0..=1.0).contains(&a.min_link_quality),
            "analysis.min_link_quality must be between 0 and 1"
        );
        ensure!(
            (0.0..=1.0).contains(&a.max_inactive_pppoe_ratio),
            "analysis.max_inactive_pppoe_ratio must be between 0 and 1"
        );
        ensure!(
            (0.0..=100.0).contains(&a.max_cpu_load),
            "analysis.max_cpu_load must be a percentage"
        );
        ensure!(
            (0.0..=100.0).contains(&a.max_memory_usage),
            "analysis.max_memory_usage must be a percentage"
        );
        ensure!(
            compare_versions(&a.min_firmware_version, &a.min_firmware_version).is_some(),
            "analysis.min_firmware_version {:?} is not a version",
            a.min_firmware_version
        );

        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.address.trim()) {
                tracing::warn!("Target {} is listed more than once", target.address);
            }
        }
        Ok(())
    }

    /// Resolve every target against the defaults.
    pub fn targets(&self) -> Vec<Target> {
        let d = &self.defaults;
        self.targets
            .iter()
            .map(|t| {
                let username = t.username.as_deref().unwrap_or(&d.username);
                let password = t.password.as_ref().unwrap_or(&d.password);
                let timeout = t.timeout_secs.unwrap_or(d.timeout_secs);

                let mut target = Target::new(t.address.trim())
                    .with_port(t.port.unwrap_or(d.port))
                    .with_credentials(Credentials::new(username, password.expose()))
                    .with_timeout(Duration::try_from_secs_f64(timeout).unwrap_or(DEFAULT_TIMEOUT));
                if let Some(name) = t.name.as_deref().filter(|n| !n.trim().is_empty()) {
                    target = target.with_name(name);
                }
                target
            })
            .collect()
    }

    pub fn collect_options(&self) -> CollectOptions {
        let c = &self.collection;
        let delay = Duration::try_from_secs_f64(c.retry_delay_secs).unwrap_or_default();
        CollectOptions {
            max_workers: if c.parallel { c.max_workers.max(1) } else { 1 },
            retry: RetryPolicy {
                max_attempts: c.retry_attempts.max(1),
                delay,
                backoff: c.backoff,
                max_delay: Duration::try_from_secs_f64(c.max_retry_delay_secs).unwrap_or(delay),
            },
            categories: c.collect,
        }
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        let a = &self.analysis;
        AnalysisOptions {
            enabled: a.enabled,
            topology: TopologyOptions {
                enabled: a.analyze_links,
                min_confidence: a.min_link_quality,
                station_policy: a.station_policy,
            },
            anomalies: AnomalyOptions {
                enabled: a.detect_anomalies,
                rules: a.rules,
                thresholds: Thresholds {
                    max_cpu_load: a.max_cpu_load,
                    max_memory_usage: a.max_memory_usage,
                    min_firmware_version: a.min_firmware_version.clone(),
                    max_inactive_pppoe_ratio: a.max_inactive_pppoe_ratio,
                },
            },
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Passed on the command line
    CommandLine,
    /// Named by the environment variable
    Environment,
    /// Found at the default config file location
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CommandLine => write!(f, "command line"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// A validated configuration plus where it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl LoadedConfig {
    /// Capture directory, relative paths taken from the config file's directory.
    pub fn replay_dir(&self) -> Option<PathBuf> {
        let dir = self.config.source.replay_dir.as_ref()?;
        if dir.is_absolute() {
            return Some(dir.clone());
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(dir))
    }
}

/// Get the path to the default configuration file
pub fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("fleetmap").join("config.toml"))
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/fleetmap/config.toml".to_string())
}

/// Pick the configuration file to use, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    let from_env = std::env::var(ENV_CONFIG_PATH).ok();
    let default_path = get_config_file_path().filter(|p| p.exists());
    pick_config_path(explicit, from_env, default_path)
}

fn pick_config_path(
    explicit: Option<&Path>,
    from_env: Option<String>,
    default_path: Option<PathBuf>,
) -> Option<(PathBuf, ConfigSource)> {
    // Priority 1: command line
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    // Priority 2: environment variable
    if let Some(path) = from_env.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
        return Some((PathBuf::from(path), ConfigSource::Environment));
    }

    // Priority 3: default location
    default_path.map(|p| (p, ConfigSource::ConfigFile))
}

/// Find, read and validate the configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some((path, source)) = resolve_config_path(explicit) else {
        bail!(
            "no configuration found; create {} or pass --config (see `fleetmap config`)",
            get_config_file_path_string()
        );
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = Config::from_toml(&content)
        .with_context(|| format!("failed to load config file {}", path.display()))?;

    tracing::info!(
        "Loaded {} target(s) from {} ({})",
        config.targets.len(),
        path.display(),
        source
    );
    Ok(LoadedConfig {
        config,
        path,
        source,
    })
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# fleetmap configuration
# Place this file at: ~/.config/fleetmap/config.toml

[defaults]
username = "admin"
password = ""
port = 8728
timeout_secs = 10

[[targets]]
name = "core-1"
address = "192.168.88.1"

[[targets]]
address = "192.168.88.2"
# username = "readonly"
# password = "secret"
# port = 8729
# timeout_secs = 5

[collection]
parallel = true
max_workers = 5
# Total attempts per device, including the first
retry_attempts = 2
retry_delay_secs = 2
# "fixed" or "exponential"
backoff = "fixed"
max_retry_delay_secs = 60

[collection.collect]
system_info = true
interfaces = true
ip_addresses = true
neighbors = true
pppoe_active = true
pppoe_secrets = true
wireless = true

[analysis]
enabled = true
analyze_links = true
detect_anomalies = true
min_link_quality = 0.0
# How to type a station seen by several access points:
# "point_to_multipoint" or "point_to_point"
station_policy = "point_to_multipoint"
max_cpu_load = 90
max_memory_usage = 90
min_firmware_version = "6.0"
max_inactive_pppoe_ratio = 0.5

[analysis.rules]
multiple_addresses = true
disabled_interface_with_address = true
unknown_neighbor = false
excess_inactive_pppoe = true
uncommented_interface = true
outdated_firmware = true
resource_pressure = true

[source]
# Directory of captured device output, one <address>.json per target.
# Relative paths are resolved against this file's directory.
replay_dir = "captures"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::from_toml(&generate_example_config()).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.collection.max_workers, 5);
        assert_eq!(config.analysis.max_cpu_load, 90.0);
        assert!(!config.analysis.rules.unknown_neighbor);
        assert_eq!(config.source.replay_dir, Some(PathBuf::from("captures")));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("[[targets]]\nip = \"10.0.0.1\"\n").unwrap();
        let targets = config.targets();
        assert_eq!(targets[0].address, "10.0.0.1");
        assert_eq!(targets[0].port, DEFAULT_PORT);
        assert_eq!(targets[0].timeout, DEFAULT_TIMEOUT);
        assert_eq!(targets[0].credentials.username, "admin");

        let opts = config.collect_options();
        assert_eq!(opts.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(opts.retry.max_attempts, 2);
        assert_eq!(opts.retry.delay, Duration::from_secs(2));
        assert!(opts.categories.neighbors);

        let analysis = config.analysis_options();
        assert!(analysis.enabled);
        assert_eq!(analysis.topology.station_policy, StationPolicy::PointToMultipoint);
        assert_eq!(analysis.anomalies.thresholds.min_firmware_version, "6.0");
    }

    #[test]
    fn test_target_overrides_defaults() {
        let config = Config::from_toml(
            r#"
            [defaults]
            username = "monitor"
            password = "fleet"
            timeout_secs = 4

            [[targets]]
            address = "10.0.0.1"
            name = "edge"
            password = "override"
            port = 8729
            timeout_secs = 1.5

            [[targets]]
            address = "10.0.0.2"
            "#,
        )
        .unwrap();
        let targets = config.targets();

        assert_eq!(targets[0].label(), "edge");
        assert_eq!(targets[0].port, 8729);
        assert_eq!(targets[0].credentials.username, "monitor");
        assert_eq!(targets[0].credentials.password, "override");
        assert_eq!(targets[0].timeout, Duration::from_millis(1500));
        assert_eq!(targets[1].credentials.password, "fleet");
        assert_eq!(targets[1].timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_sequential_collection_uses_one_worker() {
        let config = Config::from_toml(
            "[[targets]]\naddress = \"10.0.0.1\"\n[collection]\nparallel = false\nmax_workers = 8\nbackoff = \"exponential\"\n",
        )
        .unwrap();
        let opts = config.collect_options();
        assert_eq!(opts.max_workers, 1);
        assert_eq!(opts.retry.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_validation_errors() {
        assert!(Config::from_toml("").is_err());

        let bad = [
            "[[targets]]\naddress = \" \"\n",
            "[[targets]]\naddress = \"a\"\n[collection]\nmax_workers = 0\n",
            "[[targets]]\naddress = \"a\"\n[collection]\nretry_attempts = 0\n",
            "[[targets]]\naddress = \"a\"\n[analysis]\nmin_link_quality = 1.5\n",
            "[[targets]]\naddress = \"a\"\n[analysis]\nmax_cpu_load = 120\n",
            "[[targets]]\naddress = \"a\"\n[analysis]\nmin_firmware_version = \"latest\"\n",
            "[[targets]]\naddress = \"a\"\ntimeout_secs = 0\n",
            "[[targets]]\naddress = \"a\"\n[analysis]\nstation_policy = \"mesh\"\n",
        ];
        for content in bad {
            assert!(Config::from_toml(content).is_err(), "accepted: {}", content);
        }
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let config = Config::from_toml("[[targets]]\naddress = \"a\"\npassword = \"hunter2\"\n").unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_config_path_priority() {
        let explicit = PathBuf::from("/etc/fleetmap.toml");
        let default = Some(PathBuf::from("/home/u/.config/fleetmap/config.toml"));

        let (path, source) =
            pick_config_path(Some(&explicit), Some("/tmp/env.toml".to_string()), default.clone()).unwrap();
        assert_eq!(path, explicit);
        assert_eq!(source, ConfigSource::CommandLine);

        let (path, source) = pick_config_path(None, Some("/tmp/env.toml".to_string()), default.clone()).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/env.toml"));
        assert_eq!(source, ConfigSource::Environment);

        let (_, source) = pick_config_path(None, Some("  ".to_string()), default).unwrap();
        assert_eq!(source, ConfigSource::ConfigFile);

        assert!(pick_config_path(None, None, None).is_none());
    }

    #[test]
    fn test_replay_dir_relative_to_config_file() {
        let loaded = LoadedConfig {
            config: Config::from_toml("[[targets]]\naddress = \"a\"\n[source]\nreplay_dir = \"captures\"\n").unwrap(),
            path: PathBuf::from("/etc/fleetmap/config.toml"),
            source: ConfigSource::CommandLine,
        };
        assert_eq!(loaded.replay_dir(), Some(PathBuf::from("/etc/fleetmap/captures")));
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = std::env::temp_dir().join(format!("fleetmap-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, generate_example_config()).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.source, ConfigSource::CommandLine);
        assert_eq!(loaded.config.targets.len(), 2);

        assert!(load_config(Some(&dir.join("missing.toml"))).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
