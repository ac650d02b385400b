//! # Run Configuration
//!
//! Loaded once at startup from a JSON file. `${VAR}` placeholders anywhere in
//! the file are replaced with environment variables before parsing, so the
//! directory and remote-execution passwords can stay out of the file itself.
//!
//! Only the connection and portal keys are required; every tuning knob has a
//! default matching the values the sweep has always used.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

pub const DEFAULT_SERIAL_COMMAND: &str = "Get-WmiObject Win32_BIOS | Select-Object SerialNumber";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("missing environment variable(s): {0}")]
    MissingVars(String),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ldap_server: String,
    pub ad_user: String,
    pub ad_password: String,
    pub search_base: String,
    pub wmi_user: String,
    pub wmi_password: String,
    pub driver_location: PathBuf,
    pub web_url: String,
    pub input_xpath: String,
    pub warranty_xpath: String,

    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub workers: WorkerSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Management port used for the liveness probe (SMB).
    pub port: u16,
    pub timeout_ms: u64,
    pub dns_timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            port: 445,
            timeout_ms: 1_000,
            dns_timeout_ms: 2_000,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Liveness probing. Defaults to the number of available cores.
    pub probe: Option<usize>,
    pub identity: usize,
    /// Each lookup worker owns one browser process.
    pub lookup: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            probe: None,
            identity: 4,
            lookup: 4,
        }
    }
}

impl WorkerSettings {
    pub fn probe_workers(&self) -> usize {
        self.probe.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub powershell: PathBuf,
    pub command: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            powershell: PathBuf::from("pwsh"),
            command: DEFAULT_SERIAL_COMMAND.to_string(),
            timeout_secs: 60,
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Firefox,
    Chrome,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub kind: BrowserKind,
    pub headless: bool,
    /// First local port handed out to driver processes; each session takes the next one.
    pub port: u16,
    pub startup_timeout_secs: u64,
    pub page_load_timeout_secs: u64,
    pub element_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Firefox,
            headless: true,
            port: 4444,
            startup_timeout_secs: 20,
            page_load_timeout_secs: 30,
            element_timeout_secs: 10,
        }
    }
}

impl BrowserSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub use_tls: bool,
    pub timeout_secs: u64,
    pub page_size: i32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            use_tls: true,
            timeout_secs: 30,
            page_size: 500,
        }
    }
}

impl DirectorySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub warranty_csv: PathBuf,
    pub errors_csv: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            warranty_csv: PathBuf::from("warranty_info.csv"),
            errors_csv: PathBuf::from("errors.csv"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: String = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, |name| std::env::var(name).ok())
    }

    /// Parses a JSON document, resolving `${VAR}` placeholders through `lookup`.
    pub fn from_json<F>(raw: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let substituted: String = substitute_vars(raw, lookup)?;
        let config: Config = serde_json::from_str(&substituted)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 6] = [
            ("ldap_server", &self.ldap_server),
            ("search_base", &self.search_base),
            ("web_url", &self.web_url),
            ("input_xpath", &self.input_xpath),
            ("warranty_xpath", &self.warranty_xpath),
            ("wmi_user", &self.wmi_user),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        let counts: [(&'static str, usize); 3] = [
            ("workers.probe", self.workers.probe_workers()),
            ("workers.identity", self.workers.identity),
            ("workers.lookup", self.workers.lookup),
        ];
        for (field, count) in counts {
            if count == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }

        let timeouts: [(&'static str, u64); 7] = [
            ("probe.timeout_ms", self.probe.timeout_ms),
            ("probe.dns_timeout_ms", self.probe.dns_timeout_ms),
            ("remote.timeout_secs", self.remote.timeout_secs),
            ("browser.startup_timeout_secs", self.browser.startup_timeout_secs),
            ("browser.page_load_timeout_secs", self.browser.page_load_timeout_secs),
            ("browser.element_timeout_secs", self.browser.element_timeout_secs),
            ("directory.timeout_secs", self.directory.timeout_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "timeouts must be greater than zero"));
            }
        }

        if self.directory.page_size <= 0 {
            return Err(invalid("directory.page_size", "must be positive"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Replaces every `${NAME}` with `lookup(NAME)`. All missing names are reported at once.
pub fn substitute_vars<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Vec<String> = Vec::new();

    let output = ENV_VAR_RE.replace_all(input, |caps: &regex::Captures<'_>| {
        let name: &str = &caps[1];
        match lookup(name) {
            Some(value) => json_escape(&value),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(ConfigError::MissingVars(missing.join(", ")));
    }

    Ok(output.into_owned())
}

// Placeholders sit inside JSON strings, so the value must be escaped the same way.
fn json_escape(value: &str) -> String {
    let quoted: String = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"{
        "ldap_server": "dc01.corp.example",
        "ad_user": "CORP\\svc-sweep",
        "ad_password": "${AD_PASSWORD}",
        "search_base": "OU=Workstations,DC=corp,DC=example",
        "wmi_user": "CORP\\svc-wmi",
        "wmi_password": "${WMI_PASSWORD}",
        "driver_location": "/usr/local/bin/geckodriver",
        "web_url": "https://support.vendor.example/warranty",
        "input_xpath": "//input[@id='serial']",
        "warranty_xpath": "//div[@class='warranty-status']"
    }"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::from_json(
            MINIMAL,
            env(&[("AD_PASSWORD", "a"), ("WMI_PASSWORD", "w")]),
        )
        .unwrap();

        assert_eq!(cfg.ad_password, "a");
        assert_eq!(cfg.wmi_password, "w");
        assert_eq!(cfg.probe.port, 445);
        assert_eq!(cfg.probe.timeout(), Duration::from_secs(1));
        assert_eq!(cfg.browser.element_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.workers.lookup, 4);
        assert_eq!(cfg.remote.command, DEFAULT_SERIAL_COMMAND);
        assert_eq!(cfg.output.warranty_csv, PathBuf::from("warranty_info.csv"));
        assert_eq!(cfg.output.errors_csv, PathBuf::from("errors.csv"));
        assert!(cfg.browser.headless);
    }

    #[test]
    fn missing_variables_are_all_reported() {
        let err = Config::from_json(MINIMAL, env(&[])).unwrap_err();
        let msg: String = err.to_string();
        assert!(msg.contains("AD_PASSWORD"), "got: {msg}");
        assert!(msg.contains("WMI_PASSWORD"), "got: {msg}");
    }

    #[test]
    fn substituted_values_are_json_escaped() {
        let cfg = Config::from_json(
            MINIMAL,
            env(&[("AD_PASSWORD", "p\"a\\ss"), ("WMI_PASSWORD", "w")]),
        )
        .unwrap();
        assert_eq!(cfg.ad_password, "p\"a\\ss");
    }

    #[test]
    fn zero_lookup_workers_is_rejected() {
        let raw: String = MINIMAL.replacen('{', r#"{ "workers": { "lookup": 0 },"#, 1);
        let err = Config::from_json(&raw, env(&[("AD_PASSWORD", "a"), ("WMI_PASSWORD", "w")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "workers.lookup",
                ..
            }
        ));
    }

    #[test]
    fn tuning_sections_override_defaults() {
        let raw: String = MINIMAL.replacen(
            '{',
            r#"{ "probe": { "port": 5985, "timeout_ms": 250 }, "browser": { "kind": "chrome", "headless": false },"#,
            1,
        );
        let cfg = Config::from_json(&raw, env(&[("AD_PASSWORD", "a"), ("WMI_PASSWORD", "w")]))
            .unwrap();
        assert_eq!(cfg.probe.port, 5985);
        assert_eq!(cfg.probe.timeout(), Duration::from_millis(250));
        assert_eq!(cfg.probe.dns_timeout_ms, 2_000);
        assert_eq!(cfg.browser.kind, BrowserKind::Chrome);
        assert!(!cfg.browser.headless);
    }

    #[test]
    fn missing_required_key_is_a_parse_error() {
        let raw: String = MINIMAL.replace(r#""web_url": "https://support.vendor.example/warranty","#, "");
        let err = Config::from_json(&raw, env(&[("AD_PASSWORD", "a"), ("WMI_PASSWORD", "w")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
