use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::archiver::discard_partial;
use super::command::{CommandRunner, CommandSpec};
use super::digest::digest_file;
use super::error::BackupError;
use super::models::{Artifact, ArtifactKind, Credentials, Engine};
use super::naming::ArtifactNamer;

/// Produces one logical dump file per database.
pub struct Dumper {
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl Dumper {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Option<Duration>) -> Self {
        Self { runner, timeout }
    }

    /// Dump every database of one engine, one result per database in input order.
    pub async fn dump(
        &self,
        databases: &[String],
        engine: Engine,
        credentials: &Credentials,
        namer: &mut ArtifactNamer,
    ) -> Vec<Result<Artifact, BackupError>> {
        let mut results = Vec::with_capacity(databases.len());
        for database in databases {
            let file_name = namer.dump_name(database);
            let output = namer.claim(&file_name);
            results.push(
                self.dump_one(database, engine, credentials, output, namer)
                    .await,
            );
        }
        results
    }

    async fn dump_one(
        &self,
        database: &str,
        engine: Engine,
        credentials: &Credentials,
        output: PathBuf,
        namer: &ArtifactNamer,
    ) -> Result<Artifact, BackupError> {
        let fail = |cause: String| BackupError::Dump {
            database: database.to_string(),
            engine,
            cause,
        };

        let spec = dump_command(database, engine, credentials, &output)
            .map_err(fail)?
            .timeout(self.timeout);

        info!(
            database = %database,
            engine = %engine,
            artifact = %output.display(),
            "Dumping database"
        );

        if let Err(e) = self.runner.run(&spec).await {
            discard_partial(&output).await;
            return Err(BackupError::from_command(e, database, fail));
        }

        let digest = match digest_file(&output).await {
            Ok(d) => d,
            Err(e) => {
                discard_partial(&output).await;
                return Err(fail(format!("dump file unreadable: {}", e)));
            }
        };

        debug!(
            database = %database,
            size_bytes = digest.size_bytes,
            digest = %digest.hex,
            "Dump ready"
        );

        Ok(Artifact {
            local_path: output,
            kind: ArtifactKind::Dump,
            created_at: namer.created_at(),
            source_identifier: database.to_string(),
            size_bytes: digest.size_bytes,
            digest: digest.hex,
        })
    }
}

/// Build the engine-specific dump invocation writing to `output`.
///
/// MySQL relies on host trust (or the client's option files). PostgreSQL takes
/// its password through `PGPASSWORD` in the child's own environment.
/// Names starting with `-` are refused since mysqldump has no reliable
/// end-of-options marker.
pub fn dump_command(
    database: &str,
    engine: Engine,
    credentials: &Credentials,
    output: &Path,
) -> Result<CommandSpec, String> {
    if database.starts_with('-') {
        return Err(format!("database name `{}` looks like an option", database));
    }
    match engine {
        Engine::MySql => {
            let mut spec = CommandSpec::new("mysqldump");
            if let Some(user) = &credentials.mysql_user {
                spec = spec.arg(format!("--user={}", user));
            }
            let mut result_file = std::ffi::OsString::from("--result-file=");
            result_file.push(output);
            Ok(spec.arg("--databases").arg(database).arg(result_file))
        }
        Engine::PostgreSql => {
            let password = credentials
                .postgres_password
                .as_deref()
                .ok_or_else(|| "no PostgreSQL password configured".to_string())?;
            Ok(CommandSpec::new("pg_dump")
                .arg("-Fc")
                .arg("-U")
                .arg(&credentials.postgres_user)
                .arg("-f")
                .arg(output)
                .arg("--")
                .arg(database)
                .env("PGPASSWORD", password))
        }
    }
}
