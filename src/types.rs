use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Duración de la ventana deslizante del historial (ms)
pub const HISTORY_WINDOW_MS: u64 = 5_000;

/// Fuente reportada en cada frame de postura
pub const FRAME_SOURCE: &str = "sensor";

/// Muestras necesarias en el historial para el bonus de confianza
pub const CONFIDENT_HISTORY_LEN: usize = 20;

/// Lectura cruda de orientación tal como la entrega la plataforma (grados).
/// Cualquier canal puede faltar o venir como NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationReading {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

impl OrientationReading {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
        }
    }
}

/// Lectura cruda de aceleración incluyendo gravedad (m/s²)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReading {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl MotionReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// Evento entregado por los listeners de la plataforma
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    Orientation(OrientationReading),
    Motion(MotionReading),
}

/// Orientación saneada y normalizada a [-180, 180)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationSample {
    pub ts: u64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Aceleración saneada (canales no finitos ya llevados a 0)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSample {
    pub ts: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    /// Magnitud del vector de aceleración (sin desbordar con valores enormes)
    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y).hypot(self.z)
    }
}

/// Muestra fusionada que vive en el historial
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryEntry {
    pub ts: u64,
    /// Proxy adelante/atrás (beta)
    pub pitch: f64,
    /// Proxy izquierda/derecha (gamma)
    pub roll: f64,
    /// Rumbo (alpha), solo para deriva
    pub yaw: f64,
    /// Magnitud de aceleración
    pub movement: f64,
}

/// Frame de postura inmutable entregado a los consumidores
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureFrame {
    pub score: f64,
    pub forward_lean: bool,
    pub side_tilt: bool,
    pub unstable: bool,
    pub slouch: bool,
    pub confidence: f64,
    pub yaw_drift: f64,
    pub pitch: f64,
    pub roll: f64,
    pub stability: f64,
    pub source: &'static str,
    pub ts: u64,
    pub iso_timestamp: String,
}

impl PostureFrame {
    /// true si algún defecto de postura está activo
    pub fn has_fault(&self) -> bool {
        self.forward_lean || self.side_tilt || self.unstable || self.slouch
    }
}

/// Formatea milisegundos desde epoch como RFC 3339 con milisegundos y `Z`
pub fn iso_timestamp(ts_ms: u64) -> String {
    i64::try_from(ts_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
