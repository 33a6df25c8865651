use serde::Deserialize;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

#[derive(Deserialize, Debug)]
pub(super) struct LoggerConfig {
    #[serde(default)]
    pub format: LoggerFormat,
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { format: LoggerFormat::default(), level: default_level() }
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub(super) enum LoggerFormat {
    #[default]
    Json,
    Pretty,
}

fn default_level() -> String {
    "info".to_owned()
}

/// `RUST_LOG` wins over the configured level.
pub(super) fn init_logger(config: &LoggerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = SubscriberBuilder::default().with_env_filter(filter);

    match config.format {
        LoggerFormat::Json => builder.json().init(),
        LoggerFormat::Pretty => builder.pretty().init(),
    }
}
