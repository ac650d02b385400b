//! Remote execution through PowerShell remoting.
//!
//! Each command runs in a short-lived local PowerShell process that calls
//! `Invoke-Command` against the target. Credentials and the host name travel
//! in the child's environment and never appear on its command line.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

use sweepr_common::config::RemoteSettings;
use sweepr_common::remote::{CommandOutput, Credentials, RemoteSession, RemoteShell};

/// Exit status the wrapper script uses when the remoting transport itself
/// failed, as opposed to the remote command.
pub const TRANSPORT_FAILURE_EXIT: i32 = 250;

const ENV_HOST: &str = "SWEEPR_REMOTE_HOST";
const ENV_USER: &str = "SWEEPR_REMOTE_USER";
const ENV_PASSWORD: &str = "SWEEPR_REMOTE_PASSWORD";

pub struct PowerShellRemoting {
    executable: PathBuf,
    timeout: Duration,
}

impl PowerShellRemoting {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }
}

impl From<&RemoteSettings> for PowerShellRemoting {
    fn from(settings: &RemoteSettings) -> Self {
        Self::new(&settings.powershell, settings.timeout())
    }
}

#[async_trait]
impl RemoteShell for PowerShellRemoting {
    async fn open_session(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> anyhow::Result<Box<dyn RemoteSession>> {
        if host.trim().is_empty() {
            bail!("empty host name");
        }
        Ok(Box::new(PowerShellSession {
            executable: self.executable.clone(),
            timeout: self.timeout,
            host: host.to_string(),
            credentials: credentials.clone(),
        }))
    }
}

pub struct PowerShellSession {
    executable: PathBuf,
    timeout: Duration,
    host: String,
    credentials: Credentials,
}

#[async_trait]
impl RemoteSession for PowerShellSession {
    async fn run(&mut self, command: &str) -> anyhow::Result<CommandOutput> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command"])
            .arg(remoting_script(command))
            .env(ENV_HOST, &self.host)
            .env(ENV_USER, &self.credentials.user)
            .env(ENV_PASSWORD, &self.credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", self.executable.display()))?;

        let output: Output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("{} did not answer within {:?}", self.host, self.timeout))?
            .context("Failed to collect PowerShell output")?;

        let status_code: i32 = match output.status.code() {
            Some(TRANSPORT_FAILURE_EXIT) => bail!(
                "Remoting to {} failed: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Some(code) => code,
            None => bail!("PowerShell was terminated by a signal"),
        };

        trace!(host = %self.host, status = status_code, bytes = output.stdout.len(), "Remote command finished");
        Ok(CommandOutput {
            status_code,
            stdout: output.stdout,
        })
    }
}

/// Wraps `command` in an `Invoke-Command` call.
///
/// The remote side formats its own output with `Out-String` so the local
/// process prints exactly what the remote console would. Transport errors exit
/// with [`TRANSPORT_FAILURE_EXIT`]; any other error exits non-zero.
pub fn remoting_script(command: &str) -> String {
    format!(
        r#"$ErrorActionPreference = 'Stop'
$password = ConvertTo-SecureString $env:{ENV_PASSWORD} -AsPlainText -Force
$credential = New-Object System.Management.Automation.PSCredential($env:{ENV_USER}, $password)
try {{
    $output = Invoke-Command -ComputerName $env:{ENV_HOST} -Credential $credential -ScriptBlock {{ {command} | Out-String }}
}} catch [System.Management.Automation.Remoting.PSRemotingTransportException] {{
    [Console]::Error.WriteLine($_.Exception.Message)
    exit {TRANSPORT_FAILURE_EXIT}
}}
[Console]::Out.Write($output)
exit 0
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_embeds_command_but_not_secrets() {
        let script: String = remoting_script("Get-WmiObject Win32_BIOS | Select-Object SerialNumber");
        assert!(script.contains("-ScriptBlock { Get-WmiObject Win32_BIOS | Select-Object SerialNumber | Out-String }"));
        assert!(script.contains("$env:SWEEPR_REMOTE_HOST"));
        assert!(script.contains("exit 250"));
    }

    #[tokio::test]
    async fn empty_host_is_rejected() {
        let shell = PowerShellRemoting::new("pwsh", Duration::from_secs(1));
        let res = shell.open_session(" ", &Credentials::new("u", "p")).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn missing_executable_is_an_error() {
        let shell = PowerShellRemoting::new("/nonexistent/pwsh", Duration::from_secs(1));
        let mut session = shell
            .open_session("pc-01", &Credentials::new("u", "p"))
            .await
            .unwrap();
        assert!(session.run("hostname").await.is_err());
    }
}
