//! Shell script that stands in for the OpenSSH client.
//!
//! The script receives the same arguments the session passes to `ssh`. It
//! recognises the control master (`-M`), control requests (`-O check`,
//! `-O exit`) and plain commands, whose last argument it runs locally. The
//! master records its process id so tests can check it was reaped.

use std::fs::{Permissions, read_to_string, set_permissions, write};
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Stdio};
use std::time::Duration;

use camino::Utf8PathBuf;
use provisioner::{HostTarget, ProcessCommandRunner, SshSessionFactory, SshSettings};
use tempfile::TempDir;

/// Fake `ssh` installed in a private temporary directory.
pub struct FakeSsh {
    dir: TempDir,
    bin: Utf8PathBuf,
}

impl FakeSsh {
    /// Master and every client print `stderr` and exit with status 255, as
    /// OpenSSH does when authentication fails.
    pub fn refusing(stderr: &str) -> Self {
        Self::install(&format!(
            r#"case " $* " in
  *" -M "*) echo $$ > "$PIDFILE" ;;
esac
echo '{stderr}' >&2
exit 255
"#
        ))
    }

    /// Master stays up and answers `check`, but ignores `exit`.
    pub fn lingering() -> Self {
        Self::install(
            r#"case " $* " in
  *" -M "*) echo $$ > "$PIDFILE"; exec sleep 30 ;;
  *" -O check "*) exit 0 ;;
  *" -O exit "*) exit 0 ;;
esac
for last; do :; done
exec /bin/sh -c "$last"
"#,
        )
    }

    /// Master stays up but never accepts clients.
    pub fn never_ready() -> Self {
        Self::install(
            r#"case " $* " in
  *" -M "*) echo $$ > "$PIDFILE"; exec sleep 30 ;;
esac
echo 'Control socket connect: No such file or directory' >&2
exit 255
"#,
        )
    }

    fn install(body: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let bin = root.join("ssh");
        let script = format!("#!/bin/sh\nPIDFILE='{}'\n{body}", root.join("master.pid"));
        write(&bin, script).expect("write fake ssh");
        set_permissions(&bin, Permissions::from_mode(0o755)).expect("chmod fake ssh");
        Self { dir, bin }
    }

    /// Factory that runs this script as `ssh`.
    pub fn factory(&self, connect_timeout: Duration) -> SshSessionFactory<ProcessCommandRunner> {
        let settings = SshSettings {
            ssh_bin: self.bin.to_string(),
            batch_mode: true,
            connect_timeout,
        };
        SshSessionFactory::new(ProcessCommandRunner::default(), settings)
    }

    pub fn target(&self) -> HostTarget {
        HostTarget::new("default", self.bin.with_file_name("ssh_config"))
    }

    /// Process id the control master recorded, once it has started.
    pub fn master_pid(&self) -> Option<String> {
        read_to_string(self.dir.path().join("master.pid"))
            .ok()
            .map(|pid| pid.trim().to_owned())
            .filter(|pid| !pid.is_empty())
    }

    /// Returns `true` while a process with the master's id still exists,
    /// including as an unreaped zombie.
    pub fn master_alive(&self) -> bool {
        let Some(pid) = self.master_pid() else {
            return false;
        };
        Command::new("kill")
            .args(["-0", &pid])
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}
