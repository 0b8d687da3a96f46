use crate::core::command::CommandSpec;
use crate::core::models::Destination;
use crate::core::transfer_engine::TransferEngine;
use std::path::Path;

/// rsync over ssh. rsync verifies every transferred file against a whole-file
/// checksum, and `--protect-args` keeps the remote shell from re-splitting paths.
pub struct RsyncEngine;

impl RsyncEngine {
    fn remote_shell(destination: &Destination) -> String {
        let key = destination.identity_file.to_string_lossy();
        let mut shell = format!("ssh -i {}", shell_word(&key));
        if let Some(port) = destination.port {
            shell.push_str(&format!(" -p {}", port));
        }
        shell.push_str(" -o BatchMode=yes");
        shell
    }
}

/// rsync splits `-e` on spaces and honours quotes, where a doubled quote
/// stands for a literal one.
fn shell_word(word: &str) -> String {
    if word.contains([' ', '\'', '"']) {
        format!("'{}'", word.replace('\'', "''"))
    } else {
        word.to_string()
    }
}

impl TransferEngine for RsyncEngine {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn command(&self, local: &Path, destination: &Destination) -> CommandSpec {
        CommandSpec::new("rsync")
            .arg("-az")
            .arg("--protect-args")
            .arg("-e")
            .arg(Self::remote_shell(destination))
            .arg(local)
            .arg(destination.remote_spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn destination(port: Option<u16>) -> Destination {
        Destination {
            host: "10.0.0.5".to_string(),
            user: "backup".to_string(),
            remote_path: "/srv/backups".to_string(),
            identity_file: PathBuf::from("/root/.ssh/id_rsa"),
            port,
        }
    }

    #[test]
    fn test_rsync_command() {
        let spec = RsyncEngine.command(
            Path::new("/tmp/20240309-web-1-etc.tar.gz"),
            &destination(None),
        );

        assert_eq!(spec.program, "rsync");
        assert_eq!(
            spec.args_lossy(),
            vec![
                "-az",
                "--protect-args",
                "-e",
                "ssh -i /root/.ssh/id_rsa -o BatchMode=yes",
                "/tmp/20240309-web-1-etc.tar.gz",
                "backup@10.0.0.5:/srv/backups",
            ]
        );
    }

    #[test]
    fn test_rsync_custom_port() {
        let spec = RsyncEngine.command(Path::new("/tmp/a.tar.gz"), &destination(Some(2222)));
        assert_eq!(
            spec.args_lossy()[3],
            "ssh -i /root/.ssh/id_rsa -p 2222 -o BatchMode=yes"
        );
    }

    #[test]
    fn test_identity_file_with_spaces_is_quoted() {
        let mut dest = destination(None);
        dest.identity_file = PathBuf::from("/root/backup keys/id_ed25519");
        let spec = RsyncEngine.command(Path::new("/tmp/a.tar.gz"), &dest);
        assert_eq!(
            spec.args_lossy()[3],
            "ssh -i '/root/backup keys/id_ed25519' -o BatchMode=yes"
        );
        assert_eq!(shell_word("/keys/o'neil"), "'/keys/o''neil'");
    }
}
