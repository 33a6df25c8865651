use std::{collections::HashMap, path::Path};

use campus_access::{session::DemoAccount, ProfileFallback};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

use crate::{logger::LoggerConfig, Args};

const ENV_PREFIX: &str = "CAMPUS_PORTAL";

#[derive(Deserialize, Debug)]
pub(crate) struct ApplicationConfig {
    pub port: u16,
    #[serde(default)]
    pub session_store: SessionStoreConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub access: AccessConfig,
    /// Replaces the built-in demo accounts.
    pub demo_accounts: Option<Vec<DemoAccount>>,
    #[serde(default)]
    pub log: LoggerConfig,
}

#[derive(Deserialize, Debug, Default)]
pub struct SessionStoreConfig {
    pub url: Option<Url>,
    pub key: Option<String>,
    #[serde(default)]
    pub demo_mode: bool,
    pub profile_table: Option<String>,
    pub session_lifetime_secs: Option<i64>,
}

impl SessionStoreConfig {
    /// Demo accounts are used unless both the url and a non-empty key are present.
    pub fn hosted(&self) -> Option<(&Url, &str)> {
        match (&self.url, self.key.as_deref()) {
            (Some(url), Some(key)) if !self.demo_mode && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct IdentityConfig {
    pub settle_attempts: u32,
    pub settle_backoff_ms: u64,
    pub profile_fallback: ProfileFallback,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { settle_attempts: 5, settle_backoff_ms: 50, profile_fallback: ProfileFallback::default() }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct AccessConfig {
    pub grace_period_secs: u64,
    /// Role label to dashboard path.
    pub dashboards: HashMap<String, String>,
    pub pages: Vec<PageConfig>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { grace_period_secs: 3, dashboards: HashMap::new(), pages: Vec::new() }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PageConfig {
    pub prefix: String,
    pub roles: Vec<String>,
    pub redirect_to: Option<String>,
}

pub(super) fn load_config(args: Args) -> anyhow::Result<ApplicationConfig> {
    let config_file_path = if let Some(path_override) = args.config {
        path_override
    } else {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("campus-portal")?;

        let user_config_dir = xdg_dirs.get_config_home();
        if !user_config_dir.exists() {
            std::fs::create_dir_all(&user_config_dir)?;
        }

        let mut config_file_path = user_config_dir.clone();
        config_file_path.push("portal_config.toml");

        if !config_file_path.exists() {
            write_default_config_file(&config_file_path)?;
        }

        config_file_path
    };

    let config: ApplicationConfig = Config::builder()
        .set_default("port", 3000)?
        .add_source(File::from(config_file_path).format(FileFormat::Toml))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .set_override_option("port", args.port.map(|port| port.to_string()))?
        .set_override_option("session_store.url", args.session_store_url)?
        .set_override_option("session_store.key", args.session_store_key)?
        .set_override_option("session_store.demo_mode", args.demo_mode.then_some(true))?
        .build()?
        .try_deserialize()?;

    Ok(config)
}

fn write_default_config_file(path: &Path) -> anyhow::Result<()> {
    let default_config_content = include_str!("../static/default_config.toml");
    std::fs::write(path, default_config_content)?;
    Ok(())
}
