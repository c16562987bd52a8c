use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the HTTP server, the broadcast hub and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the address the server binds to and where the event stream is served.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub events_path: String,
}

/// Configuration settings for the broadcast hub.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HubSettings {
    /// Messages buffered per subscriber before new ones are dropped for it.
    pub queue_capacity: usize,
    /// Idle time after which a heartbeat comment is written.
    pub heartbeat_interval_secs: u64,
    /// Body chunks buffered per connection ahead of the socket.
    pub write_buffer: usize,
    /// Recent events retained for replay to reconnecting clients.
    pub backlog_size: usize,
    /// Messages buffered between publishers and the hub controller.
    pub source_capacity: usize,
}

impl HubSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub events_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub queue_capacity: Option<usize>,
    pub heartbeat_interval_secs: Option<u64>,
    pub write_buffer: Option<usize>,
    pub backlog_size: Option<usize>,
    pub source_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            events_path: "/events".to_string(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            heartbeat_interval_secs: 30,
            write_buffer: 16,
            backlog_size: 256,
            source_capacity: 256,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            hub: HubSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
