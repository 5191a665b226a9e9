use std::time::Duration;
use std::{env, fmt, fs, io, path};

use checker::checker::MAX_TEST_TARGETS;
use checker::dispatcher::MAX_WORKERS_PER_TYPE;
use checker::resolver::Inventory;
use checker::transport::{RESULTS_TOPIC, RUNNER_TOPIC};
use checker::workers::HttpClientConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIN_HEARTBEAT_SECONDS: u64 = 15;
const MAX_HEARTBEAT_SECONDS: u64 = 60;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Failed to write config: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub checker: Checker,
    #[serde(default)]
    pub heartbeat: Heartbeat,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub inventory: Inventory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Checker {
    pub customer_id: String,
    pub max_workers_per_type: usize,
    pub max_content_length: usize,
    pub slate_url: Option<String>,
    pub runner_topic: String,
    pub results_topic: String,
    pub max_test_targets: usize,
}

impl Default for Checker {
    fn default() -> Self {
        Self {
            customer_id: String::new(),
            max_workers_per_type: MAX_WORKERS_PER_TYPE,
            max_content_length: HttpClientConfig::default().max_content_length,
            slate_url: None,
            runner_topic: RUNNER_TOPIC.into(),
            results_topic: RESULTS_TOPIC.into(),
            max_test_targets: MAX_TEST_TARGETS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Heartbeat {
    pub interval_seconds: u64,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self { interval_seconds: MIN_HEARTBEAT_SECONDS }
    }
}

impl Heartbeat {
    /// Beat interval, clamped to 15-60 seconds
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.clamp(MIN_HEARTBEAT_SECONDS, MAX_HEARTBEAT_SECONDS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().is_none_or(|ext| ext != "toml") {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/checker/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("checker/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Checker")?;
        write_1(f, "Customer", &self.checker.customer_id)?;
        write_1(f, "Workers Per Type", &self.checker.max_workers_per_type)?;
        write_1(f, "Max Content Length", &self.checker.max_content_length)?;
        write_1(f, "Slate", &self.checker.slate_url.as_deref().unwrap_or("disabled"))?;
        write_1(f, "Runner Topic", &self.checker.runner_topic)?;
        write_1(f, "Results Topic", &self.checker.results_topic)?;
        write_1(f, "Max Test Targets", &self.checker.max_test_targets)?;
        write_title_1(f, "Heartbeat")?;
        write_1(f, "Interval", &format!("{}s", self.heartbeat.interval().as_secs()))?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;
        write_title_1(f, "Inventory")?;
        write_1(f, "Security Groups", &self.inventory.security_groups.len())?;
        write_1(f, "Load Balancers", &self.inventory.load_balancers.len())?;
        write_1(f, "Autoscaling Groups", &self.inventory.autoscaling_groups.len())?;
        write_1(f, "Instances", &self.inventory.instances.len())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/checker/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}
