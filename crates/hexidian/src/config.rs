//! Daemon configuration: an optional YAML file overlaid with `HEXIDIAN__SECTION__KEY`
//! environment variables.

use anyhow::{Context, Result};
use asterisk_db::DbConfig;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::reconciler::ReconcilerSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Guru3 event source
    pub guru3: Guru3Config,

    /// OpenMobility Manager
    pub omm: OmmConfig,

    /// Asterisk realtime database
    pub asterisk: AsteriskConfig,

    /// Handset registration endpoint
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Unbound handset discovery
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Event processing
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guru3Config {
    pub host: String,

    /// Defaults to the scheme's port
    #[serde(default)]
    pub port: Option<u16>,

    /// Use https/wss
    #[serde(default = "default_true")]
    pub tls: bool,

    pub api_key: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmmConfig {
    pub host: String,

    #[serde(default = "default_omm_port")]
    pub port: u16,

    pub username: String,

    pub password: SecretString,

    /// The OMM ships a self-signed certificate
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// How often the subscription mode is re-armed
    #[serde(default = "default_subscription_interval", with = "humantime_serde")]
    pub subscription_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsteriskConfig {
    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    pub username: String,

    pub password: SecretString,

    #[serde(default = "default_db_name")]
    pub database: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Leading dialled digits selecting the registration service
    #[serde(default = "default_token_prefix_len")]
    pub token_prefix_len: usize,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    #[serde(default = "default_temp_digits")]
    pub temp_digits: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// `hierarchy1` value marking the DECT users this daemon owns
    #[serde(default = "default_ownership_tag")]
    pub ownership_tag: String,

    /// Event types acknowledged without processing (list, or comma separated)
    #[serde(default = "default_ignored_types", deserialize_with = "string_or_list")]
    pub ignored_types: Vec<String>,

    #[serde(default = "default_password_length")]
    pub password_length: usize,

    /// Capacity of the job queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// Default implementations
impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            token_prefix_len: default_token_prefix_len(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval: default_discovery_interval(),
            temp_prefix: default_temp_prefix(),
            temp_digits: default_temp_digits(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            ownership_tag: default_ownership_tag(),
            ignored_types: default_ignored_types(),
            password_length: default_password_length(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_omm_port() -> u16 {
    12622
}

fn default_subscription_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_db_host() -> String {
    "localhost".into()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "asterisk".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_token_prefix_len() -> usize {
    4
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_discovery_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_temp_prefix() -> String {
    "010".into()
}

fn default_temp_digits() -> usize {
    4
}

fn default_ownership_tag() -> String {
    "GURU_MGR".into()
}

/// Guru3 brackets a full resync with these markers; they carry no extension data.
fn default_ignored_types() -> Vec<String> {
    vec!["SYNC_STARTED".into(), "SYNC_ENDED".into()]
}

fn default_password_length() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".into()
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::List(items) => items,
        StringOrList::Csv(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

impl Config {
    /// Load configuration from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("HEXIDIAN")
                    .prefix_separator("__")
                    .separator("__")
                    // Numbers like 010 must stay strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn guru3_base_url(&self) -> String {
        guru3_client::Guru3Client::base_url_for(&self.guru3.host, self.guru3.port, self.guru3.tls)
    }

    pub fn db_config(&self) -> DbConfig {
        let asterisk = &self.asterisk;
        DbConfig::new(&asterisk.host, &asterisk.username, asterisk.password.clone())
            .port(asterisk.port)
            .database(&asterisk.database)
            .max_connections(asterisk.max_connections)
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            ownership_tag: self.reconciler.ownership_tag.clone(),
            ignored_types: self.reconciler.ignored_types.iter().cloned().collect::<HashSet<_>>(),
            password_length: self.reconciler.password_length,
            temp_prefix: self.discovery.temp_prefix.clone(),
            temp_digits: self.discovery.temp_digits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    const MINIMAL: &str = r#"
guru3:
  host: guru3.example.org
  api_key: k3y
omm:
  host: omm.example.org
  username: admin
  password: omm-pw
asterisk:
  username: asterisk
  password: db-pw
"#;

    fn load_yaml(yaml: &str) -> Result<Config> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(yaml.as_bytes())?;
        Config::load(Some(file.path()))
    }

    #[test]
    fn test_defaults() {
        let config = load_yaml(MINIMAL).unwrap();

        assert_eq!(config.guru3_base_url(), "https://guru3.example.org");
        assert_eq!(config.guru3.api_key.expose_secret(), "k3y");
        assert_eq!(config.omm.port, 12622);
        assert_eq!(config.omm.subscription_interval, Duration::from_secs(15));
        assert_eq!(config.discovery.interval, Duration::from_secs(60));
        assert_eq!(config.discovery.temp_prefix, "010");
        assert_eq!(config.registration.token_prefix_len, 4);
        assert_eq!(config.reconciler.ownership_tag, "GURU_MGR");
        assert_eq!(config.log.format, LogFormat::Text);

        let settings = config.reconciler_settings();
        assert_eq!(settings.password_length, 16);
        assert!(settings.ignored_types.contains("SYNC_STARTED"));
        assert!(settings.ignored_types.contains("SYNC_ENDED"));
        assert_eq!(settings.ignored_types.len(), 2);
    }

    #[test]
    fn test_overrides() {
        let yaml = format!(
            "{}\ndiscovery:\n  interval: 5m\n  temp_prefix: \"099\"\nreconciler:\n  ignored_types: \"UPDATE_CALLGROUP, CUSTOM\"\nlog:\n  format: json\n",
            MINIMAL
        );
        let config = load_yaml(&yaml).unwrap();

        assert_eq!(config.discovery.interval, Duration::from_secs(300));
        assert_eq!(config.discovery.temp_prefix, "099");
        assert_eq!(config.reconciler.ignored_types, vec!["UPDATE_CALLGROUP", "CUSTOM"]);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let yaml = MINIMAL.replace("  api_key: k3y\n", "");
        assert!(load_yaml(&yaml).is_err());
    }
}
