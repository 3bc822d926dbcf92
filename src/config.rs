use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Per-call backend deadline in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Upper bound for a whole fan-out, in seconds
    #[serde(default)]
    pub aggregate_ceiling_secs: Option<u64>,
    /// Directory served under `/s/`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_call_timeout_secs() -> u64 {
    50
}

fn default_static_dir() -> String {
    "static".to_string()
}

/// One site and the backend that serves its articles.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub domain: String,
    pub address: String,
    /// Display title, falls back to the domain
    #[serde(default)]
    pub name: Option<String>,
}

impl SiteConfig {
    pub fn new(domain: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            address: address.into(),
            name: None,
        }
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.domain)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.call_timeout_secs == 0 {
            anyhow::bail!("call_timeout_secs must be greater than zero");
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.domain.as_str()) {
                anyhow::bail!("duplicate site domain '{}'", site.domain);
            }
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Never shorter than the per-call deadline.
    pub fn aggregate_ceiling(&self) -> Duration {
        let secs = self
            .aggregate_ceiling_secs
            .unwrap_or(self.call_timeout_secs.saturating_add(5))
            .max(self.call_timeout_secs);
        Duration::from_secs(secs)
    }
}
