use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config IO error on {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Failed to spawn fusion worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Fallos reportados por la plataforma de sensores
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Permission request for {stream} failed: {reason}")]
    PermissionRequest { stream: &'static str, reason: String },

    #[error("Could not attach sensor listeners: {0}")]
    Attach(String),
}
