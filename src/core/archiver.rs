use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::command::{CommandRunner, CommandSpec};
use super::digest::digest_file;
use super::error::BackupError;
use super::models::{Artifact, ArtifactKind};
use super::naming::ArtifactNamer;

/// Packs filesystem paths into gzip-compressed tarballs in the staging directory.
pub struct Archiver {
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl Archiver {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Option<Duration>) -> Self {
        Self { runner, timeout }
    }

    /// Archive every path, one result per path in input order.
    ///
    /// A failing path never stops the remaining ones from being attempted.
    pub async fn archive(
        &self,
        paths: &[String],
        namer: &mut ArtifactNamer,
    ) -> Vec<Result<Artifact, BackupError>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let file_name = namer.archive_name(path);
            let output = namer.claim(&file_name);
            results.push(self.archive_one(path, output, namer).await);
        }
        results
    }

    async fn archive_one(
        &self,
        path: &str,
        output: PathBuf,
        namer: &ArtifactNamer,
    ) -> Result<Artifact, BackupError> {
        let fail = |cause: String| BackupError::Archive {
            path: path.to_string(),
            cause,
        };

        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => return Err(fail("path does not exist".to_string())),
            Err(e) => return Err(fail(format!("cannot access path: {}", e))),
        }

        info!(path = %path, artifact = %output.display(), "Archiving");

        let spec = CommandSpec::new("tar")
            .arg("-cpzf")
            .arg(&output)
            .arg("--")
            .arg(path)
            .timeout(self.timeout);

        if let Err(e) = self.runner.run(&spec).await {
            discard_partial(&output).await;
            return Err(BackupError::from_command(e, path, fail));
        }

        let digest = match digest_file(&output).await {
            Ok(d) => d,
            Err(e) => {
                discard_partial(&output).await;
                return Err(fail(format!("archive unreadable after tar: {}", e)));
            }
        };

        debug!(
            path = %path,
            size_bytes = digest.size_bytes,
            digest = %digest.hex,
            "Archive ready"
        );

        Ok(Artifact {
            local_path: output,
            kind: ArtifactKind::Archive,
            created_at: namer.created_at(),
            source_identifier: path.to_string(),
            size_bytes: digest.size_bytes,
            digest: digest.hex,
        })
    }
}

/// Remove output left behind by a failed tool run.
pub(crate) async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial artifact"
        ),
    }
}
