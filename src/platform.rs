use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::error::PlatformError;
use crate::types::SensorEvent;

/// Si un flujo de eventos necesita concesión explícita del usuario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionRequirement {
    NotRequired,
    Required,
}

/// Resultado de una petición de permiso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

/// Lo que la plataforma declara tener. Solo lectura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub has_orientation: bool,
    pub has_motion: bool,
    pub orientation_permission: PermissionRequirement,
    pub motion_permission: PermissionRequirement,
    pub user_agent: String,
    pub max_touch_points: u32,
}

/// Fuente de eventos de orientación/movimiento del dispositivo.
///
/// Los listeners solo envían `SensorEvent` por el canal recibido en
/// `attach_listeners`; nunca tocan el estado del motor.
pub trait SensorPlatform: Send + Sync {
    fn capabilities(&self) -> PlatformCapabilities;

    fn request_orientation_permission(&self) -> Result<PermissionState, PlatformError>;

    fn request_motion_permission(&self) -> Result<PermissionState, PlatformError>;

    fn attach_listeners(&self, tx: Sender<SensorEvent>) -> Result<(), PlatformError>;

    /// Debe ser seguro llamarlo sin listeners activos
    fn detach_listeners(&self);
}

/// Plataforma sin sensores (escritorio, servidor). Siempre cae a la señal sintética.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform;

impl SensorPlatform for HeadlessPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            has_orientation: false,
            has_motion: false,
            orientation_permission: PermissionRequirement::NotRequired,
            motion_permission: PermissionRequirement::NotRequired,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
            max_touch_points: 0,
        }
    }

    fn request_orientation_permission(&self) -> Result<PermissionState, PlatformError> {
        Ok(PermissionState::Denied)
    }

    fn request_motion_permission(&self) -> Result<PermissionState, PlatformError> {
        Ok(PermissionState::Denied)
    }

    fn attach_listeners(&self, _tx: Sender<SensorEvent>) -> Result<(), PlatformError> {
        Err(PlatformError::Attach("no sensors on this platform".to_string()))
    }

    fn detach_listeners(&self) {}
}

/// Contadores de ingesta de una instancia del motor
#[derive(Debug, Default)]
pub struct EngineStats {
    events_received: AtomicU64,
    samples_accepted: AtomicU64,
    frames_emitted: AtomicU64,
    synthetic_frames: AtomicU64,
}

/// Copia instantánea de `EngineStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub samples_accepted: u64,
    pub frames_emitted: u64,
    pub synthetic_frames: u64,
}

impl EngineStats {
    pub fn record_event(&self, accepted: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if accepted {
            self.samples_accepted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_frame(&self, synthetic: bool) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
        if synthetic {
            self.synthetic_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            synthetic_frames: self.synthetic_frames.load(Ordering::Relaxed),
        }
    }
}
