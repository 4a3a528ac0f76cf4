//! Configures `tracing-subscriber` from `[logger]` in the config file,
//! the way the teacher's CLI wires up its own subscriber at startup —
//! only here the level and formatter are config-driven instead of fixed.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggerConfig};

pub fn init(config: &LoggerConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        }
    }
}
