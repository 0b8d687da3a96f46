use tracing::{error, info, warn};

use crate::context::RunContext;
use crate::core::archiver::Archiver;
use crate::core::dumper::Dumper;
use crate::core::error::BackupError;
use crate::core::models::{Artifact, ArtifactKind, BackupJob, RunReport, TransferResult};
use crate::core::naming::ArtifactNamer;
use crate::core::notifications::RunEvent;
use crate::core::transfer_engine::create_engine;
use crate::core::transporter::Transporter;

/// Drives one backup pass: archive the sources and ship each archive, then dump
/// the databases engine by engine and ship each dump. Item failures are logged
/// and recorded; the run always completes with a report.
pub struct Orchestrator {
    ctx: RunContext,
    archiver: Archiver,
    dumper: Dumper,
    transporter: Transporter,
}

impl Orchestrator {
    pub fn new(ctx: RunContext) -> Self {
        let settings = &ctx.settings;
        let archiver = Archiver::new(ctx.runner.clone(), settings.tool_timeout);
        let dumper = Dumper::new(ctx.runner.clone(), settings.tool_timeout);
        let transporter = Transporter::new(
            create_engine(settings.transfer_engine),
            ctx.runner.clone(),
            settings.transfer_timeout,
        );

        Self {
            ctx,
            archiver,
            dumper,
            transporter,
        }
    }

    pub async fn run(&self, job: &BackupJob) -> RunReport {
        let settings = &self.ctx.settings;
        let mut report = RunReport::new(settings.hostname.clone());
        let mut namer = ArtifactNamer::new(&settings.temp_dir, &settings.hostname);

        info!(
            run_id = %report.run_id,
            sources = job.sources.len(),
            databases = job.databases.len(),
            destination = %job.destination.remote_spec(),
            "Starting backup run"
        );

        let archives = self.archiver.archive(&job.sources, &mut namer).await;
        for result in archives {
            let entry = self.ship(result, ArtifactKind::Archive, job).await;
            report.push(entry);
        }

        for (engine, names) in job.databases_by_engine() {
            let dumps = self
                .dumper
                .dump(&names, engine, &job.credentials, &mut namer)
                .await;
            for result in dumps {
                let entry = self.ship(result, ArtifactKind::Dump, job).await;
                report.push(entry);
            }
        }

        report.finish();

        info!(
            run_id = %report.run_id,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            duration_secs = report.duration_secs(),
            "Backup run finished"
        );

        self.notify(&report).await;
        report
    }

    /// Transport a produced artifact, or record why there is none.
    async fn ship(
        &self,
        produced: Result<Artifact, BackupError>,
        kind: ArtifactKind,
        job: &BackupJob,
    ) -> TransferResult {
        let entry = match produced {
            Ok(artifact) => self.transporter.transfer(&artifact, &job.destination).await,
            Err(e) => {
                error!(item = %e.item(), kind = e.kind(), error = %e, "Backup item failed");
                return TransferResult::from_error(kind, &e);
            }
        };

        if !entry.is_success() {
            error!(
                item = %entry.artifact_identifier,
                kind = "transfer",
                error = entry.error_detail.as_deref().unwrap_or_default(),
                retained = ?entry.retained_path,
                "Backup item failed"
            );
        }
        entry
    }

    async fn notify(&self, report: &RunReport) {
        let Some(notifier) = &self.ctx.notifier else {
            return;
        };
        if !report.has_failures() && !self.ctx.settings.notify_on_success {
            return;
        }
        if let Err(e) = notifier.notify(RunEvent::from_report(report)).await {
            warn!(error = %e, "Failed to send run notification");
        }
    }
}
