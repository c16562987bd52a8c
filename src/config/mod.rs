mod settings;

use std::path::Path;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{HubSettings, LoggingSettings, ServerSettings, Settings};

/// File consulted when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from a file (optional) and `SSEHUB_*` environment variables.
/// Nested keys use a double underscore, e.g. `SSEHUB_SERVER__PORT=9000`.
/// Whatever is missing is filled from `Settings::default()`.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix("SSEHUB")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let server = partial.server;
    let hub = partial.hub;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            events_path: server
                .as_ref()
                .and_then(|s| s.events_path.clone())
                .unwrap_or(default.server.events_path),
        },
        hub: HubSettings {
            queue_capacity: hub
                .as_ref()
                .and_then(|h| h.queue_capacity)
                .unwrap_or(default.hub.queue_capacity),
            heartbeat_interval_secs: hub
                .as_ref()
                .and_then(|h| h.heartbeat_interval_secs)
                .unwrap_or(default.hub.heartbeat_interval_secs),
            write_buffer: hub
                .as_ref()
                .and_then(|h| h.write_buffer)
                .unwrap_or(default.hub.write_buffer),
            backlog_size: hub
                .as_ref()
                .and_then(|h| h.backlog_size)
                .unwrap_or(default.hub.backlog_size),
            source_capacity: hub
                .as_ref()
                .and_then(|h| h.source_capacity)
                .unwrap_or(default.hub.source_capacity),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
            json: logging
                .as_ref()
                .and_then(|l| l.json)
                .unwrap_or(default.logging.json),
        },
    })
}
