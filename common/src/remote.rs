use std::fmt;

use async_trait::async_trait;

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a remote command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

/// Remote command execution against Windows hosts.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Prepares an authenticated session to `host`.
    ///
    /// An `Err` here, or from [`RemoteSession::run`], means the command never
    /// produced a status. A command that ran and failed is an `Ok` with a
    /// non-zero [`CommandOutput::status_code`].
    async fn open_session(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> anyhow::Result<Box<dyn RemoteSession>>;
}

#[async_trait]
pub trait RemoteSession: Send {
    /// Runs `command`. Implementations bound the call with their own timeout.
    async fn run(&mut self, command: &str) -> anyhow::Result<CommandOutput>;
}
