//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bkrun::config::RuntimeSettings;
use bkrun::core::transfer_engine::TransferEngineType;
use bkrun::core::{
    BackupJob, CommandError, CommandRunner, CommandSpec, Credentials, DatabaseTarget, Destination,
    Engine,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// How the fake runner answers for a given program.
#[derive(Debug, Clone)]
pub enum Scripted {
    Succeed,
    /// Writes partial output, then exits nonzero
    Fail(String),
    Timeout,
    /// Succeeds, but swaps the transferred file for a directory so the
    /// local copy cannot be unlinked afterwards
    SucceedUndeletable,
}

/// Records every command and materialises tool output inside the staging dir,
/// so archives and dumps look real to the rest of the pipeline.
pub struct FakeRunner {
    staging: PathBuf,
    scripts: HashMap<String, Scripted>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new(staging: &Path) -> Self {
        Self {
            staging: staging.to_path_buf(),
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(mut self, program: &str, behaviour: Scripted) -> Self {
        self.scripts.insert(program.to_string(), behaviour);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }

    fn is_transfer(spec: &CommandSpec) -> bool {
        spec.program == "rsync" || spec.program == "scp"
    }

    fn staged_arg(&self, spec: &CommandSpec) -> Option<PathBuf> {
        spec.args_lossy().into_iter().find_map(|arg| {
            let candidate = arg.strip_prefix("--result-file=").unwrap_or(&arg);
            let path = PathBuf::from(candidate);
            path.starts_with(&self.staging).then_some(path)
        })
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(spec.clone());

        let behaviour = self
            .scripts
            .get(&spec.program)
            .cloned()
            .unwrap_or(Scripted::Succeed);

        let staged = self.staged_arg(spec);
        if let (Some(path), false) = (&staged, Self::is_transfer(spec)) {
            let content = format!("{} {}", spec.program, spec.args_lossy().join(" "));
            std::fs::write(path, content).unwrap();
        }

        match behaviour {
            Scripted::Succeed => Ok(()),
            Scripted::SucceedUndeletable => {
                if let Some(path) = staged {
                    std::fs::remove_file(&path).unwrap();
                    std::fs::create_dir(&path).unwrap();
                }
                Ok(())
            }
            Scripted::Fail(stderr) => Err(CommandError::Failed {
                program: spec.program.clone(),
                status: "exit status: 1".to_string(),
                stderr,
            }),
            Scripted::Timeout => Err(CommandError::TimedOut {
                program: spec.program.clone(),
                after: spec.timeout.unwrap_or(Duration::from_secs(1)),
            }),
        }
    }
}

pub fn settings(staging: &Path) -> RuntimeSettings {
    RuntimeSettings {
        temp_dir: staging.to_path_buf(),
        hostname: "web-1".to_string(),
        tool_timeout: Some(Duration::from_secs(60)),
        transfer_timeout: Some(Duration::from_secs(60)),
        transfer_engine: TransferEngineType::Rsync,
        notify_on_success: true,
    }
}

pub fn destination() -> Destination {
    Destination {
        host: "10.0.0.5".to_string(),
        user: "backup".to_string(),
        remote_path: "/srv/backups".to_string(),
        identity_file: PathBuf::from("/root/.ssh/id_rsa"),
        port: None,
    }
}

pub fn job(sources: &[&str], databases: &[(&str, Engine)]) -> BackupJob {
    BackupJob {
        sources: sources.iter().map(|s| s.to_string()).collect(),
        databases: databases
            .iter()
            .map(|(name, engine)| DatabaseTarget {
                name: name.to_string(),
                engine: *engine,
            })
            .collect(),
        destination: destination(),
        credentials: Credentials {
            mysql_user: None,
            postgres_user: "postgres".to_string(),
            postgres_password: Some("x".to_string()),
        },
    }
}

/// Regular files left in the staging directory
pub fn staged_files(staging: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(staging)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
