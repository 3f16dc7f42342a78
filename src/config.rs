use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::EngineError;

/// Forzado manual de la clasificación teléfono/tableta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOverride {
    /// Usar la heurística de user agent / puntos táctiles
    #[default]
    Auto,
    Phone,
    NotPhone,
}

/// Parámetros del motor, inmutables por instancia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Intervalo mínimo entre muestras lógicas (default: 66 ms, ~15 Hz)
    pub sample_interval_ms: u64,
    /// Intervalo mínimo entre frames emitidos (default: 200 ms)
    pub emit_debounce_ms: u64,
    /// Pitch a partir del cual hay inclinación hacia delante (default: 18°)
    pub forward_threshold_deg: f64,
    /// |roll| a partir del cual hay inclinación lateral (default: 14°)
    pub roll_threshold_deg: f64,
    /// Caída de estabilidad, en unidades de 4 puntos, que marca inestabilidad (default: 7.5)
    pub unstable_threshold: f64,
    /// Tiempo de inclinación sostenida antes de declarar slouch (default: 2500 ms)
    pub slouch_sustain_ms: u64,
    /// Forzado de la heurística de dispositivo (default: auto)
    pub device_override: DeviceOverride,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 66,
            emit_debounce_ms: 200,
            forward_threshold_deg: 18.0,
            roll_threshold_deg: 14.0,
            unstable_threshold: 7.5,
            slouch_sustain_ms: 2500,
            device_override: DeviceOverride::Auto,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "sample_interval_ms must be > 0".to_string(),
            ));
        }
        if self.emit_debounce_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "emit_debounce_ms must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("forward_threshold_deg", self.forward_threshold_deg),
            ("roll_threshold_deg", self.roll_threshold_deg),
            ("unstable_threshold", self.unstable_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be finite and >= 0 (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Estabilidad por debajo de la cual el frame se marca inestable
    pub fn unstable_cutoff(&self) -> f64 {
        100.0 - self.unstable_threshold * 4.0
    }
}
