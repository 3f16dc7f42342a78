//! Motor de fusión de sensores de orientación y movimiento que produce una
//! señal continua de calidad de postura, con degradación a una señal
//! sintética cuando no hay sensores o permiso.

pub mod availability;
pub mod capture;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fusion;
pub mod history;
pub mod permission;
pub mod platform;
pub mod recording;
pub mod types;

pub use config::{DeviceOverride, EngineConfig};
pub use engine::{EngineMode, PostureEngine, PERMISSION_DENIED_MESSAGE};
pub use error::{EngineError, PlatformError};
pub use fusion::SensorFusion;
pub use platform::{HeadlessPlatform, SensorPlatform, StatsSnapshot};
pub use recording::{load_recording, replay_offline, RecordedEvent, ReplayPlatform};
pub use types::{MotionReading, OrientationReading, PostureFrame, SensorEvent};
