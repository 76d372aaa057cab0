//! Daemon settings.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file given with `--config` (or `LAYERINDEX_CONFIG`)
//! 3. Environment variables `LAYERINDEX_<SECTION>__<KEY>`, e.g.
//!    `LAYERINDEX_REGISTRY__PASSWORD`
//! 4. Command-line flags
//!
//! ```toml
//! [registry]
//! url = "https://registry.internal:5000"
//! username = "scheduler"
//! timeout_secs = 30
//! platform = "linux/amd64"
//!
//! [watcher]
//! poll_interval_secs = 10
//! crawl_concurrency = 4
//!
//! [cache]
//! snapshot_path = "/var/lib/layerindex/cache.json"
//!
//! [server]
//! listen = "0.0.0.0:8787"
//! ```

use anyhow::Context;
use clap::Parser;
use config::{Config, Environment, File};
use layerindex_infra_registry::{Credentials, PlatformSelector, RegistryConfig};
use layerindex_sync::WatcherConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments
#[derive(Debug, Default, Parser)]
#[command(version, about = "Registry image layer index")]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAYERINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry base url, e.g. http://localhost:5000
    #[arg(long)]
    pub registry_url: Option<String>,

    /// Registry username; the password is read from config or environment
    #[arg(long)]
    pub username: Option<String>,

    /// Seconds between registry polls
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Where the metadata snapshot is written
    #[arg(long, value_name = "PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// Listen address in host:port format
    #[arg(long, value_name = "HOST:PORT")]
    pub listen: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub watcher: WatcherSettings,
    pub cache: CacheSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherSettings {
    pub poll_interval_secs: u64,
    pub crawl_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub listen: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    pub level: Option<String>,
}

impl Settings {
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .set_default("registry.url", "http://localhost:5000")?
            .set_default("registry.timeout_secs", 30)?
            .set_default("registry.platform", "linux/amd64")?
            .set_default("watcher.poll_interval_secs", 10)?
            .set_default("watcher.crawl_concurrency", 1)?
            .set_default("cache.snapshot_path", "cache.json")?
            .set_default("server.listen", "127.0.0.1:8787")?;

        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("LAYERINDEX")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("registry.url", args.registry_url.clone())?
            .set_override_option("registry.username", args.username.clone())?
            .set_override_option("watcher.poll_interval_secs", args.poll_interval_secs)?
            .set_override_option(
                "cache.snapshot_path",
                args.snapshot_path.as_ref().map(|p| p.display().to_string()),
            )?
            .set_override_option("server.listen", args.listen.clone())?
            .set_override_option("log.level", args.log_level.clone())?
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.watcher.poll_interval_secs > 0, "watcher.poll_interval_secs must be positive");
        anyhow::ensure!(self.registry.timeout_secs > 0, "registry.timeout_secs must be positive");
        Ok(())
    }

    pub fn registry_config(&self) -> anyhow::Result<RegistryConfig> {
        let platform: PlatformSelector = self
            .registry
            .platform
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(RegistryConfig {
            url: self.registry.url.clone(),
            credentials: Credentials::from_parts(self.registry.username.clone(), self.registry.password.clone()),
            timeout: Duration::from_secs(self.registry.timeout_secs),
            platform,
        })
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_secs(self.watcher.poll_interval_secs),
            crawl_concurrency: self.watcher.crawl_concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(&Args::default()).unwrap();
        assert_eq!(settings.watcher.poll_interval_secs, 10);
        assert_eq!(settings.cache.snapshot_path, PathBuf::from("cache.json"));

        let registry = settings.registry_config().unwrap();
        assert!(registry.credentials.is_none());
        assert_eq!(registry.platform, PlatformSelector::default());
    }

    #[test]
    fn test_file_then_flags() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("layerindex.toml");
        std::fs::write(
            &path,
            r#"
            [registry]
            url = "https://registry.internal"
            username = "sched"
            password = "secret"

            [watcher]
            poll_interval_secs = 60
            crawl_concurrency = 4
            "#,
        )
        .unwrap();

        let args = Args {
            config: Some(path),
            poll_interval_secs: Some(5),
            ..Args::default()
        };
        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.registry.url, "https://registry.internal");
        assert_eq!(settings.watcher.poll_interval_secs, 5);
        assert_eq!(settings.watcher_config().crawl_concurrency, 4);
        let creds = settings.registry_config().unwrap().credentials.unwrap();
        assert_eq!(creds.username, "sched");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let args = Args {
            poll_interval_secs: Some(0),
            ..Args::default()
        };
        assert!(Settings::load(&args).is_err());
    }
}
