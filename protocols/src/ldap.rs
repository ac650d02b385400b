//! Directory access over LDAP.
//!
//! Computer accounts are read with a paged subtree search so large domains
//! do not trip the server-side size limit.

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tokio::time::timeout;
use tracing::{debug, warn};

use sweepr_common::config::Config;
use sweepr_common::device::DirectoryEntry;
use sweepr_common::directory::{DirectoryConnector, DirectorySession};

pub const COMPUTER_FILTER: &str = "(objectClass=computer)";
pub const NAME_ATTRIBUTE: &str = "name";

pub struct LdapConnector {
    url: String,
    bind_dn: String,
    password: String,
    timeout: Duration,
    page_size: i32,
}

impl LdapConnector {
    pub fn new(
        server: &str,
        use_tls: bool,
        bind_dn: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
        page_size: i32,
    ) -> Self {
        Self {
            url: server_url(server, use_tls),
            bind_dn: bind_dn.into(),
            password: password.into(),
            timeout,
            page_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.ldap_server,
            config.directory.use_tls,
            &config.ad_user,
            &config.ad_password,
            config.directory.timeout(),
            config.directory.page_size,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn DirectorySession>> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection closed with an error");
            }
        });

        ldap.with_timeout(self.timeout)
            .simple_bind(&self.bind_dn, &self.password)
            .await
            .context("LDAP bind request failed")?
            .success()
            .context("LDAP bind was rejected")?;
        debug!(url = %self.url, "Bound to directory");

        Ok(Box::new(LdapSession {
            ldap,
            timeout: self.timeout,
            page_size: self.page_size,
        }))
    }
}

pub struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
    page_size: i32,
}

impl LdapSession {
    async fn search(&mut self, search_base: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.page_size)),
        ];
        let mut search = self
            .ldap
            .streaming_search_with(
                adapters,
                search_base,
                Scope::Subtree,
                COMPUTER_FILTER,
                vec![NAME_ATTRIBUTE],
            )
            .await
            .context("Failed to start directory search")?;

        let mut entries: Vec<DirectoryEntry> = Vec::new();
        while let Some(raw) = search.next().await.context("Directory search failed")? {
            let entry: SearchEntry = SearchEntry::construct(raw);
            match entry_name(&entry) {
                Some(name) => entries.push(DirectoryEntry::new(name)),
                None => debug!(dn = %entry.dn, "Skipping entry without a name"),
            }
        }

        search
            .finish()
            .await
            .success()
            .context("Directory search did not complete")?;
        Ok(entries)
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn computers(&mut self, search_base: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        let limit: Duration = self.timeout;
        timeout(limit, self.search(search_base))
            .await
            .map_err(|_| anyhow!("Directory search timed out after {limit:?}"))?
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        timeout(self.timeout, self.ldap.unbind())
            .await
            .map_err(|_| anyhow!("LDAP unbind timed out"))?
            .context("LDAP unbind failed")
    }
}

/// `ldaps://` unless TLS is disabled or the server already names a scheme.
pub fn server_url(server: &str, use_tls: bool) -> String {
    let server: &str = server.trim();
    if server.contains("://") {
        server.to_string()
    } else if use_tls {
        format!("ldaps://{server}")
    } else {
        format!("ldap://{server}")
    }
}

/// First non-blank value of the `name` attribute, matched case-insensitively.
fn entry_name(entry: &SearchEntry) -> Option<String> {
    entry
        .attrs
        .iter()
        .find(|(attr, _)| attr.eq_ignore_ascii_case(NAME_ATTRIBUTE))
        .and_then(|(_, values)| values.iter().find(|v| !v.trim().is_empty()))
        .map(|v| v.trim().to_string())
}
