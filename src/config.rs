//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `BKRUN_*`
//! environment variables (`__` separates sections, e.g.
//! `BKRUN_DESTINATION__SERVER`), then command-line overrides.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::models::{BackupJob, Credentials, DatabaseTarget, Destination, Engine};
use crate::core::transfer_engine::TransferEngineType;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/bkrun/config.toml";
const DEFAULT_IDENTITY_FILE: &str = "/root/.ssh/id_rsa";
const DEFAULT_TEMP_DIR: &str = "/tmp";
const DEFAULT_POSTGRES_USER: &str = "postgres";
const DEFAULT_TIMEOUT_SECS: u64 = 3600;
const ENV_PREFIX: &str = "BKRUN_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub mysql: MysqlSection,
    #[serde(default)]
    pub postgresql: PostgresSection,
    /// Extra (name, engine) pairs beyond the per-engine sections
    #[serde(default)]
    pub database: Vec<DatabaseEntry>,
    #[serde(default)]
    pub destination: DestinationSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupSection {
    /// Paths to archive, as a comma-separated string or a list
    #[serde(default, deserialize_with = "comma_list")]
    pub location: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MysqlSection {
    #[serde(default, deserialize_with = "comma_list")]
    pub databases: Vec<String>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSection {
    #[serde(default, deserialize_with = "comma_list")]
    pub databases: Vec<String>,
    #[serde(default = "default_postgres_user", deserialize_with = "text")]
    pub user: String,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<String>,
}

impl Default for PostgresSection {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            user: default_postgres_user(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
    pub engine: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSection {
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub server: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for DestinationSection {
    fn default() -> Self {
        Self {
            server: None,
            user: None,
            location: None,
            identity_file: default_identity_file(),
            port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Host identity used in artifact names. Defaults to the system hostname.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub hostname: Option<String>,
    /// Bound on each archive or dump invocation; 0 disables
    #[serde(default = "default_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Bound on each transfer; 0 disables
    #[serde(default = "default_timeout_secs")]
    pub transfer_timeout_secs: u64,
    #[serde(default)]
    pub transfer_engine: TransferEngineType,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            hostname: None,
            tool_timeout_secs: DEFAULT_TIMEOUT_SECS,
            transfer_timeout_secs: DEFAULT_TIMEOUT_SECS,
            transfer_engine: TransferEngineType::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Slack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub channel: NotificationChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
    /// Also notify when every item succeeded
    #[serde(default = "default_true")]
    pub on_success: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: NotificationChannelType::None,
            slack_webhook: None,
            on_success: true,
        }
    }
}

/// Values supplied on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Default, Serialize)]
pub struct ConfigOverrides {
    pub runtime: RuntimeOverrides,
    pub logging: LoggingOverrides,
}

#[derive(Debug, Default, Serialize)]
pub struct RuntimeOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_engine: Option<TransferEngineType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
pub struct LoggingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Process-level settings for a run, separate from what gets backed up.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub temp_dir: PathBuf,
    pub hostname: String,
    pub tool_timeout: Option<Duration>,
    pub transfer_timeout: Option<Duration>,
    pub transfer_engine: TransferEngineType,
    pub notify_on_success: bool,
}

impl AppConfig {
    /// Load configuration. A file named explicitly must exist; the default
    /// path is optional.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(path, overrides, ENV_PREFIX)
    }

    fn load_with_env(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        let config = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(env_prefix).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        Ok(config)
    }

    /// Validate and assemble the job for this run.
    pub fn build_job(&self) -> Result<BackupJob, ConfigError> {
        let destination = Destination {
            host: required(&self.destination.server, "destination.server")?,
            user: required(&self.destination.user, "destination.user")?,
            remote_path: required(&self.destination.location, "destination.location")?,
            identity_file: self.destination.identity_file.clone(),
            port: self.destination.port,
        };
        if destination.identity_file.as_os_str().is_empty() {
            return Err(ConfigError::Missing("destination.identity_file"));
        }

        let mut databases: Vec<DatabaseTarget> = Vec::new();
        for name in &self.mysql.databases {
            databases.push(DatabaseTarget {
                name: name.clone(),
                engine: Engine::MySql,
            });
        }
        for name in &self.postgresql.databases {
            databases.push(DatabaseTarget {
                name: name.clone(),
                engine: Engine::PostgreSql,
            });
        }
        for entry in &self.database {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "database.name",
                    reason: "database name is empty".to_string(),
                });
            }
            let engine =
                Engine::parse(&entry.engine).ok_or_else(|| ConfigError::UnsupportedEngine {
                    database: name.to_string(),
                    engine: entry.engine.clone(),
                })?;
            databases.push(DatabaseTarget {
                name: name.to_string(),
                engine,
            });
        }

        if let Some(db) = databases.iter().find(|d| d.name.starts_with('-')) {
            return Err(ConfigError::Invalid {
                key: "database.name",
                reason: format!("`{}` would be read as a dump tool option", db.name),
            });
        }

        let postgres_password = self
            .postgresql
            .password
            .clone()
            .filter(|p| !p.is_empty());
        if postgres_password.is_none() && databases.iter().any(|d| d.engine == Engine::PostgreSql)
        {
            return Err(ConfigError::Missing("postgresql.password"));
        }

        if self.backup.location.is_empty() && databases.is_empty() {
            return Err(ConfigError::Invalid {
                key: "backup.location",
                reason: "no paths or databases to back up".to_string(),
            });
        }

        Ok(BackupJob {
            sources: self.backup.location.clone(),
            databases,
            destination,
            credentials: Credentials {
                mysql_user: self.mysql.user.clone().filter(|u| !u.is_empty()),
                postgres_user: self.postgresql.user.clone(),
                postgres_password,
            },
        })
    }

    pub fn runtime_settings(&self) -> Result<RuntimeSettings, ConfigError> {
        if !self.runtime.temp_dir.is_dir() {
            return Err(ConfigError::Invalid {
                key: "runtime.temp_dir",
                reason: format!("{} is not a directory", self.runtime.temp_dir.display()),
            });
        }

        let hostname = self
            .runtime
            .hostname
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(system_hostname);

        Ok(RuntimeSettings {
            temp_dir: self.runtime.temp_dir.clone(),
            hostname,
            tool_timeout: secs_to_timeout(self.runtime.tool_timeout_secs),
            transfer_timeout: secs_to_timeout(self.runtime.transfer_timeout_secs),
            transfer_engine: self.runtime.transfer_engine,
            notify_on_success: self.notifications.on_success,
        })
    }
}

fn required(value: &Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(key))
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn system_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// A setting that is meant as text but may arrive as a number or boolean.
/// The environment provider parses `BKRUN_POSTGRESQL__PASSWORD=123456` into
/// an integer, and TOML allows `databases = [2024]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListValue {
    One(Scalar),
    Items(Vec<Scalar>),
}

/// Accept `"a, b"` as well as `["a", "b"]`; entries are trimmed and blanks dropped.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<String> = match ListValue::deserialize(deserializer)? {
        ListValue::One(Scalar::Text(s)) => s.split(',').map(str::to_string).collect(),
        ListValue::One(value) => vec![value.into()],
        ListValue::Items(items) => items.into_iter().map(String::from).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn default_postgres_user() -> String {
    DEFAULT_POSTGRES_USER.to_string()
}

fn default_identity_file() -> PathBuf {
    PathBuf::from(DEFAULT_IDENTITY_FILE)
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_DIR)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VALID: &str = r#"
[backup]
location = "/etc, /var/www ,"

[mysql]
databases = "shop,blog"

[postgresql]
databases = ["app_db"]
password = "x"

[destination]
server = "10.0.0.5"
user = "backup"
location = "/srv/backups"
"#;

    fn load_str(content: &str) -> Result<AppConfig, ConfigError> {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        AppConfig::load(Some(&path), &ConfigOverrides::default())
    }

    #[test]
    fn test_comma_separated_lists() {
        let config = load_str(VALID).unwrap();
        assert_eq!(config.backup.location, vec!["/etc", "/var/www"]);
        assert_eq!(config.mysql.databases, vec!["shop", "blog"]);
        assert_eq!(config.postgresql.databases, vec!["app_db"]);
    }

    #[test]
    fn test_build_job() {
        let job = load_str(VALID).unwrap().build_job().unwrap();

        assert_eq!(job.sources.len(), 2);
        assert_eq!(job.databases.len(), 3);
        assert_eq!(job.item_count(), 5);
        assert_eq!(job.destination.remote_spec(), "backup@10.0.0.5:/srv/backups");
        assert_eq!(job.destination.identity_file, PathBuf::from("/root/.ssh/id_rsa"));
        assert_eq!(job.credentials.postgres_user, "postgres");
        assert_eq!(job.credentials.postgres_password.as_deref(), Some("x"));
    }

    #[test]
    fn test_defaults() {
        let config = load_str(VALID).unwrap();
        assert_eq!(config.runtime.temp_dir, PathBuf::from("/tmp"));
        assert_eq!(config.runtime.transfer_engine, TransferEngineType::Rsync);
        assert_eq!(config.runtime.tool_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.notifications.channel, NotificationChannelType::None);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_missing_destination_is_fatal() {
        let config = load_str("[backup]\nlocation = \"/etc\"\n").unwrap();
        assert!(matches!(
            config.build_job(),
            Err(ConfigError::Missing("destination.server"))
        ));
    }

    #[test]
    fn test_postgres_requires_password() {
        let content = VALID.replace("password = \"x\"", "");
        let config = load_str(&content).unwrap();
        assert!(matches!(
            config.build_job(),
            Err(ConfigError::Missing("postgresql.password"))
        ));
    }

    #[test]
    fn test_unsupported_engine_is_rejected() {
        let content = format!(
            "{}\n[[database]]\nname = \"ledger\"\nengine = \"oracle\"\n",
            VALID
        );
        let config = load_str(&content).unwrap();
        match config.build_job() {
            Err(ConfigError::UnsupportedEngine { database, engine }) => {
                assert_eq!(database, "ledger");
                assert_eq!(engine, "oracle");
            }
            other => panic!("Expected UnsupportedEngine, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_database_entries() {
        let content = format!(
            "{}\n[[database]]\nname = \"legacy\"\nengine = \"MySQL\"\n",
            VALID
        );
        let job = load_str(&content).unwrap().build_job().unwrap();
        let last = job.databases.last().unwrap();
        assert_eq!(last.name, "legacy");
        assert_eq!(last.engine, Engine::MySql);
    }

    #[test]
    fn test_empty_job_is_rejected() {
        let content = "[destination]\nserver = \"h\"\nuser = \"u\"\nlocation = \"/b\"\n";
        let config = load_str(content).unwrap();
        assert!(matches!(
            config.build_job(),
            Err(ConfigError::Invalid {
                key: "backup.location",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = AppConfig::load(
            Some(Path::new("/nonexistent/bkrun/config.toml")),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_cli_overrides_win() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let overrides = ConfigOverrides {
            runtime: RuntimeOverrides {
                temp_dir: Some(temp.path().to_path_buf()),
                transfer_engine: Some(TransferEngineType::Scp),
                tool_timeout_secs: Some(0),
            },
            logging: LoggingOverrides {
                json: Some(true),
                verbose: None,
            },
        };
        let config = AppConfig::load(Some(&path), &overrides).unwrap();
        assert_eq!(config.runtime.transfer_engine, TransferEngineType::Scp);
        assert!(config.logging.json);

        let settings = config.runtime_settings().unwrap();
        assert_eq!(settings.temp_dir, temp.path());
        assert_eq!(settings.tool_timeout, None);
        assert_eq!(settings.transfer_timeout, Some(Duration::from_secs(3600)));
        assert!(!settings.hostname.is_empty());
    }

    #[test]
    fn test_numeric_values_are_read_as_text() {
        let content = r#"
[backup]
location = "/etc"

[mysql]
databases = 2024
user = 1001

[postgresql]
databases = ["app_db", 42]
password = 123456

[destination]
server = "10.0.0.5"
user = "backup"
location = 2024
"#;
        let job = load_str(content).unwrap().build_job().unwrap();

        let names: Vec<&str> = job.databases.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["2024", "app_db", "42"]);
        assert_eq!(job.credentials.mysql_user.as_deref(), Some("1001"));
        assert_eq!(job.credentials.postgres_password.as_deref(), Some("123456"));
        assert_eq!(job.destination.remote_path, "2024");
    }

    #[test]
    fn test_numeric_environment_values() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let prefix = "BKRUN_NUMERIC_TEST_";
        // SAFETY: these variables are only read by this test.
        unsafe {
            std::env::set_var("BKRUN_NUMERIC_TEST_POSTGRESQL__PASSWORD", "123456");
            std::env::set_var("BKRUN_NUMERIC_TEST_MYSQL__DATABASES", "2024");
        }
        let config =
            AppConfig::load_with_env(Some(&path), &ConfigOverrides::default(), prefix).unwrap();

        assert_eq!(config.postgresql.password.as_deref(), Some("123456"));
        assert_eq!(config.mysql.databases, vec!["2024"]);
    }

    #[test]
    fn test_database_names_cannot_look_like_options() {
        let content = VALID.replace("shop,blog", "shop,--all-databases");
        let config = load_str(&content).unwrap();
        assert!(matches!(
            config.build_job(),
            Err(ConfigError::Invalid {
                key: "database.name",
                ..
            })
        ));
    }

    #[test]
    fn test_temp_dir_must_exist() {
        let content = format!("{}\n[runtime]\ntemp_dir = \"/nonexistent/bkrun\"\n", VALID);
        let config = load_str(&content).unwrap();
        assert!(matches!(
            config.runtime_settings(),
            Err(ConfigError::Invalid {
                key: "runtime.temp_dir",
                ..
            })
        ));
    }
}
