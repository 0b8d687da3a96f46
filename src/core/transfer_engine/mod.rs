//! Remote copy engines.
//!
//! An engine only knows how to phrase a copy as a command line. Running it,
//! bounding it in time and deciding what happens to the local file is the
//! transporter's job.

mod rsync;
mod scp;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::command::CommandSpec;
use crate::core::models::Destination;

pub use rsync::RsyncEngine;
pub use scp::ScpEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransferEngineType {
    #[default]
    Rsync,
    Scp,
}

pub trait TransferEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Command copying `local` to the destination. Must never prompt for input.
    fn command(&self, local: &Path, destination: &Destination) -> CommandSpec;
}

pub fn create_engine(engine_type: TransferEngineType) -> Box<dyn TransferEngine> {
    match engine_type {
        TransferEngineType::Rsync => Box::new(RsyncEngine),
        TransferEngineType::Scp => Box::new(ScpEngine),
    }
}
