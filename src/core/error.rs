use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::command::CommandError;
use super::models::Engine;

/// Per-item failures. These are recorded in the run report and never abort sibling items.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to archive {path}: {cause}")]
    Archive { path: String, cause: String },

    #[error("failed to dump {engine} database {database}: {cause}")]
    Dump {
        database: String,
        engine: Engine,
        cause: String,
    },

    #[error("failed to transfer {}: {cause}", .artifact.display())]
    Transfer { artifact: PathBuf, cause: String },

    #[error("{tool} timed out after {}s while processing {item}", .after.as_secs())]
    Timeout {
        item: String,
        tool: String,
        after: Duration,
    },
}

impl BackupError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Archive { .. } => "archive",
            Self::Dump { .. } => "dump",
            Self::Transfer { .. } => "transfer",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Path, database name, or artifact the failure belongs to.
    pub fn item(&self) -> String {
        match self {
            Self::Archive { path, .. } => path.clone(),
            Self::Dump { database, .. } => database.clone(),
            Self::Transfer { artifact, .. } => artifact.display().to_string(),
            Self::Timeout { item, .. } => item.clone(),
        }
    }

    /// Map a runner failure, keeping timeouts distinct from tool errors.
    pub(crate) fn from_command(
        err: CommandError,
        item: &str,
        otherwise: impl FnOnce(String) -> BackupError,
    ) -> Self {
        match err {
            CommandError::TimedOut { program, after } => Self::Timeout {
                item: item.to_string(),
                tool: program,
                after,
            },
            other => otherwise(other.to_string()),
        }
    }
}

/// Malformed or incomplete job configuration. Fatal before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("unsupported database engine `{engine}` for database `{database}`")]
    UnsupportedEngine { database: String, engine: String },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
