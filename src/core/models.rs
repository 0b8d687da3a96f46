use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::error::BackupError;

/// Database systems the dumper knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgresql")]
    PostgreSql,
}

impl Engine {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgresql" | "postgres" | "pg" => Some(Self::PostgreSql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseTarget {
    pub name: String,
    pub engine: Engine,
}

/// Remote end of every transfer. Authentication is by key only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub host: String,
    pub user: String,
    pub remote_path: String,
    /// SSH private key used for the transfer channel
    pub identity_file: PathBuf,
    pub port: Option<u16>,
}

impl Destination {
    /// Format as "user@host:path" for rsync and scp
    pub fn remote_spec(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.remote_path)
    }
}

/// Database credentials. Secrets are never serialized or debug-printed.
#[derive(Clone, Default, Serialize)]
pub struct Credentials {
    pub mysql_user: Option<String>,
    pub postgres_user: String,
    #[serde(skip_serializing)]
    pub postgres_password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mysql_user", &self.mysql_user)
            .field("postgres_user", &self.postgres_user)
            .field(
                "postgres_password",
                &self.postgres_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything one run backs up. Built once at startup and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct BackupJob {
    pub sources: Vec<String>,
    pub databases: Vec<DatabaseTarget>,
    pub destination: Destination,
    pub credentials: Credentials,
}

impl BackupJob {
    /// Number of report entries a run of this job produces.
    pub fn item_count(&self) -> usize {
        self.sources.len() + self.databases.len()
    }

    /// Database names grouped by engine, in order of first appearance.
    pub fn databases_by_engine(&self) -> Vec<(Engine, Vec<String>)> {
        let mut groups: Vec<(Engine, Vec<String>)> = Vec::new();
        for db in &self.databases {
            match groups.iter_mut().find(|(engine, _)| *engine == db.engine) {
                Some((_, names)) => names.push(db.name.clone()),
                None => groups.push((db.engine, vec![db.name.clone()])),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Archive,
    Dump,
}

/// A packaged file waiting in the staging directory for transport.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub local_path: PathBuf,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Local>,
    /// Source path or database name the artifact was produced from
    pub source_identifier: String,
    pub size_bytes: u64,
    /// BLAKE3 hex digest of the artifact contents
    pub digest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// Final disposition of one backup item.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub artifact_identifier: String,
    pub kind: ArtifactKind,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Local file left behind for retry or manual intervention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retained_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl TransferResult {
    /// Entry for an item that never produced an artifact.
    pub fn from_error(kind: ArtifactKind, err: &BackupError) -> Self {
        Self {
            artifact_identifier: err.item().to_string(),
            kind,
            outcome: Outcome::Failure,
            error_detail: Some(err.to_string()),
            retained_path: None,
            digest: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Outcome record for one invocation of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub host: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub entries: Vec<TransferResult>,
}

impl RunReport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            host: host.into(),
            started_at: Local::now(),
            finished_at: None,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: TransferResult) {
        self.entries.push(entry);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransferResult> {
        self.entries.iter().filter(|e| !e.is_success())
    }

    pub fn duration_secs(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}
