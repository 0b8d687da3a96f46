use crate::core::command::CommandSpec;
use crate::core::models::Destination;
use crate::core::transfer_engine::TransferEngine;
use std::path::Path;

/// Plain scp for hosts without rsync installed.
pub struct ScpEngine;

impl TransferEngine for ScpEngine {
    fn name(&self) -> &'static str {
        "scp"
    }

    fn command(&self, local: &Path, destination: &Destination) -> CommandSpec {
        let mut spec = CommandSpec::new("scp")
            .arg("-B")
            .arg("-q")
            .arg("-i")
            .arg(&destination.identity_file);
        if let Some(port) = destination.port {
            spec = spec.arg("-P").arg(port.to_string());
        }
        spec.arg("-o")
            .arg("BatchMode=yes")
            .arg(local)
            .arg(destination.remote_spec())
    }
}
