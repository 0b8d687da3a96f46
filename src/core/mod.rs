pub mod archiver;
pub mod command;
pub mod digest;
pub mod dumper;
pub mod error;
pub mod models;
pub mod naming;
pub mod notifications;
pub mod orchestrator;
pub mod transfer_engine;
pub mod transporter;

pub use archiver::Archiver;
pub use command::{CommandError, CommandRunner, CommandSpec, SystemRunner};
pub use dumper::Dumper;
pub use error::{BackupError, ConfigError};
pub use models::{
    Artifact, ArtifactKind, BackupJob, Credentials, DatabaseTarget, Destination, Engine, Outcome,
    RunReport, TransferResult,
};
pub use naming::ArtifactNamer;
pub use orchestrator::Orchestrator;
pub use transporter::Transporter;
