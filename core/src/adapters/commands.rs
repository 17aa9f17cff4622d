//! System commands issued by the release engine, per platform.
//!
//! | purpose        | Windows                          | Linux / macOS              |
//! |----------------|----------------------------------|----------------------------|
//! | listing        | `netstat.exe -ano`               | `ss -Htanp` / `lsof -nP -iTCP` |
//! | primary kill   | `taskkill.exe /PID n /T [/F]`    | recursive `pgrep -P` walk via `sh` |
//! | fallback kill  | PowerShell `Stop-Process -Force` | `kill -9 n`                |
//! | name lookup    | `tasklist.exe /FO CSV /NH /FI`   | `ps -p n -o comm=`         |
//! | codepage probe | `cmd.exe /c chcp`                | none                       |

use crate::domain::Platform;
use crate::ports::CommandSpec;

/// Builds the command lines for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemCommands {
    platform: Platform,
}

impl SystemCommands {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Commands for the platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(Platform::current())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Network state listing covering every TCP socket and its owner.
    ///
    /// Flags explained (ss):
    /// -H  Suppress header line
    /// -t  TCP sockets only
    /// -a  All states, not just listening
    /// -n  Don't resolve service names
    /// -p  Show process using socket
    pub fn listing(&self) -> CommandSpec {
        match self.platform {
            Platform::Windows => CommandSpec::new("netstat.exe", ["-ano"]),
            Platform::Linux => CommandSpec::new("ss", ["-Htanp"]),
            Platform::MacOs => CommandSpec::new("lsof", ["-nP", "-iTCP"]),
        }
    }

    /// Primary termination: the whole process tree, forced only if asked.
    ///
    /// On Unix the tree is walked with `pgrep -P` depth first, so
    /// grandchildren are signalled before their parents. The exit status is
    /// that of the signal sent to `pid` itself.
    pub fn primary_kill(&self, pid: u32, force: bool) -> CommandSpec {
        match self.platform {
            Platform::Windows => {
                let mut args = vec!["/PID".to_string(), pid.to_string(), "/T".to_string()];
                if force {
                    args.push("/F".to_string());
                }
                CommandSpec::new("taskkill.exe", args)
            }
            Platform::Linux | Platform::MacOs => {
                let signal = if force { "KILL" } else { "TERM" };
                CommandSpec::new("sh", ["-c".to_string(), kill_tree_script(signal, pid)])
            }
        }
    }

    /// Fallback termination, independent of the primary mechanism.
    pub fn fallback_kill(&self, pid: u32) -> CommandSpec {
        match self.platform {
            Platform::Windows => CommandSpec::new(
                "powershell.exe",
                [
                    "-NoProfile".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Bypass".to_string(),
                    "-Command".to_string(),
                    format!(
                        "try {{ Stop-Process -Id {pid} -Force -ErrorAction SilentlyContinue }} catch {{ }}"
                    ),
                ],
            ),
            Platform::Linux | Platform::MacOs => {
                CommandSpec::new("kill", ["-9".to_string(), pid.to_string()])
            }
        }
    }

    /// Process name lookup filtered to one PID.
    pub fn process_name(&self, pid: u32) -> CommandSpec {
        match self.platform {
            Platform::Windows => CommandSpec::new(
                "tasklist.exe",
                [
                    "/FO".to_string(),
                    "CSV".to_string(),
                    "/NH".to_string(),
                    "/FI".to_string(),
                    format!("PID eq {pid}"),
                ],
            ),
            Platform::Linux | Platform::MacOs => CommandSpec::new(
                "ps",
                ["-p".to_string(), pid.to_string(), "-o".to_string(), "comm=".to_string()],
            ),
        }
    }

    /// Side-effect free query of the active console codepage.
    pub fn codepage_probe(&self) -> Option<CommandSpec> {
        self.platform
            .has_console_codepage()
            .then(|| CommandSpec::new("cmd.exe", ["/c", "chcp"]))
    }
}

/// Shell script signalling `pid` and all of its descendants.
fn kill_tree_script(signal: &str, pid: u32) -> String {
    format!(
        "kill_tree() {{ for child in $(pgrep -P \"$1\"); do kill_tree \"$child\"; done; \
         kill -{signal} \"$1\"; }}; kill_tree {pid}"
    )
}

impl Default for SystemCommands {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_primary_kill() {
        let commands = SystemCommands::new(Platform::Windows);
        assert_eq!(
            commands.primary_kill(1234, false).to_string(),
            "taskkill.exe /PID 1234 /T"
        );
        assert_eq!(
            commands.primary_kill(1234, true).to_string(),
            "taskkill.exe /PID 1234 /T /F"
        );
    }

    #[test]
    fn test_unix_primary_kill() {
        let commands = SystemCommands::new(Platform::Linux);
        let spec = commands.primary_kill(42, true);
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args[0], "-c");
        assert!(spec.args[1].contains("pgrep -P"));
        assert!(spec.args[1].contains("kill -KILL \"$1\""));
        assert!(spec.args[1].ends_with("kill_tree 42"));

        let spec = commands.primary_kill(42, false);
        assert!(spec.args[1].contains("kill -TERM \"$1\""));
        assert!(!spec.args[1].contains("pkill"));
    }

    /// A grandchild of the target is terminated along with it.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_primary_kill_reaches_grandchildren() {
        use crate::adapters::ProcessRunner;
        use crate::ports::CommandRunner;
        use std::time::Duration;

        let runner = ProcessRunner::default();
        let have_pgrep = runner
            .execute(
                &CommandSpec::new("sh", ["-c", "command -v pgrep"]),
                Duration::from_secs(5),
            )
            .await
            .map(|out| out.success())
            .unwrap_or(false);
        if !have_pgrep {
            return;
        }

        // Parent shell whose child shell runs the sleeping grandchild
        let tree = runner
            .execute(
                &CommandSpec::new(
                    "sh",
                    [
                        "-c",
                        "sh -c 'sleep 300 & wait' >/dev/null 2>&1 & echo $!",
                    ],
                ),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        let child: u32 = tree.lines[0].trim().parse().unwrap();

        // Let the grandchild start
        tokio::time::sleep(Duration::from_millis(200)).await;
        let grandchildren = runner
            .execute(
                &CommandSpec::new("pgrep", ["-P".to_string(), child.to_string()]),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!grandchildren.lines.is_empty());

        let spec = SystemCommands::new(Platform::Linux).primary_kill(child, true);
        runner.execute(&spec, Duration::from_secs(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // A zombie waiting for its reaper counts as terminated
        for grandchild in &grandchildren.lines {
            let status = runner
                .execute(
                    &CommandSpec::new(
                        "sh",
                        ["-c".to_string(), format!("ps -o stat= -p {} 2>/dev/null", grandchild.trim())],
                    ),
                    Duration::from_secs(5),
                )
                .await
                .unwrap();
            let alive = status
                .lines
                .iter()
                .map(|l| l.trim())
                .any(|l| !l.is_empty() && !l.starts_with('Z'));
            assert!(!alive, "grandchild {} survived", grandchild);
        }
    }

    #[test]
    fn test_fallback_kill() {
        let spec = SystemCommands::new(Platform::Windows).fallback_kill(7);
        assert_eq!(spec.program, "powershell.exe");
        assert!(spec.args[4].contains("Stop-Process -Id 7 -Force"));

        let spec = SystemCommands::new(Platform::MacOs).fallback_kill(7);
        assert_eq!(spec.to_string(), "kill -9 7");
    }

    #[test]
    fn test_codepage_probe_only_on_windows() {
        assert!(SystemCommands::new(Platform::Windows).codepage_probe().is_some());
        assert!(SystemCommands::new(Platform::Linux).codepage_probe().is_none());
        assert!(SystemCommands::new(Platform::MacOs).codepage_probe().is_none());
    }

    #[test]
    fn test_listing_per_platform() {
        assert_eq!(
            SystemCommands::new(Platform::Windows).listing().to_string(),
            "netstat.exe -ano"
        );
        assert_eq!(SystemCommands::new(Platform::Linux).listing().to_string(), "ss -Htanp");
        assert_eq!(
            SystemCommands::new(Platform::MacOs).listing().to_string(),
            "lsof -nP -iTCP"
        );
    }
}
