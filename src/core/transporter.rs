use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::command::CommandRunner;
use super::error::BackupError;
use super::models::{Artifact, Destination, Outcome, TransferResult};
use super::transfer_engine::TransferEngine;

/// Ships artifacts to the destination and decides what happens to the local copy.
///
/// On success the local file is deleted. On failure it is kept and its path is
/// reported, since it may be the only copy of the backup.
pub struct Transporter {
    engine: Box<dyn TransferEngine>,
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl Transporter {
    pub fn new(
        engine: Box<dyn TransferEngine>,
        runner: Arc<dyn CommandRunner>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            runner,
            timeout,
        }
    }

    pub async fn transfer(&self, artifact: &Artifact, destination: &Destination) -> TransferResult {
        let mut result = TransferResult {
            artifact_identifier: artifact.source_identifier.clone(),
            kind: artifact.kind,
            outcome: Outcome::Success,
            error_detail: None,
            retained_path: None,
            digest: Some(artifact.digest.clone()),
        };

        if let Err(e) = self.try_transfer(artifact, destination).await {
            result.outcome = Outcome::Failure;
            result.error_detail = Some(e.to_string());
            result.retained_path = Some(artifact.local_path.clone());
            return result;
        }

        info!(
            item = %artifact.source_identifier,
            engine = self.engine.name(),
            size_bytes = artifact.size_bytes,
            destination = %destination.remote_spec(),
            "Transfer complete"
        );

        if let Err(e) = tokio::fs::remove_file(&artifact.local_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %artifact.local_path.display(),
                    error = %e,
                    "Transferred artifact could not be removed"
                );
                result.error_detail = Some(format!("local artifact not removed: {}", e));
                result.retained_path = Some(artifact.local_path.clone());
            }
        }

        result
    }

    async fn try_transfer(
        &self,
        artifact: &Artifact,
        destination: &Destination,
    ) -> Result<(), BackupError> {
        let spec = self
            .engine
            .command(&artifact.local_path, destination)
            .timeout(self.timeout);

        self.runner.run(&spec).await.map_err(|e| {
            BackupError::from_command(e, &artifact.source_identifier, |cause| {
                BackupError::Transfer {
                    artifact: artifact.local_path.clone(),
                    cause,
                }
            })
        })
    }
}
