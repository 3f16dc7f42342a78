use std::collections::VecDeque;

use crate::capture::normalize_angle;
use crate::types::{HistoryEntry, HISTORY_WINDOW_MS};

/// Peso del roll en la métrica de bamboleo
const ROLL_WOBBLE_WEIGHT: f64 = 0.8;
/// Peso de la deriva de rumbo en la métrica de bamboleo
const DRIFT_WOBBLE_WEIGHT: f64 = 0.2;

/// Deriva absoluta respecto al rumbo base (0 si aún no hay base)
pub fn yaw_drift(yaw: f64, baseline_yaw: Option<f64>) -> f64 {
    baseline_yaw
        .map(|base| normalize_angle(yaw - base).abs())
        .unwrap_or(0.0)
}

/// Bamboleo de una entrada: |pitch| + 0.8·|roll| + 0.2·deriva
pub fn wobble(entry: &HistoryEntry, baseline_yaw: Option<f64>) -> f64 {
    entry.pitch.abs()
        + ROLL_WOBBLE_WEIGHT * entry.roll.abs()
        + DRIFT_WOBBLE_WEIGHT * yaw_drift(entry.yaw, baseline_yaw)
}

/// Historial deslizante acotado en tiempo.
/// Las entradas quedan ordenadas por `ts` no decreciente y solo se conservan
/// las de los últimos `window_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleHistory {
    entries: VecDeque<HistoryEntry>,
    window_ms: u64,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::with_window(HISTORY_WINDOW_MS)
    }

    pub fn with_window(window_ms: u64) -> Self {
        Self {
            entries: VecDeque::with_capacity(128),
            window_ms,
        }
    }

    /// Añade una entrada y descarta las que quedan fuera de la ventana.
    /// Un `ts` anterior al último se fija al último para mantener el orden.
    pub fn push(&mut self, mut entry: HistoryEntry) {
        if let Some(last) = self.entries.back() {
            if entry.ts < last.ts {
                entry.ts = last.ts;
            }
        }
        let now = entry.ts;
        self.entries.push_back(entry);
        self.prune(now);
    }

    /// Elimina las entradas con `ts < now - window_ms`
    pub fn prune(&mut self, now: u64) {
        let cutoff = now.saturating_sub(self.window_ms);
        while let Some(front) = self.entries.front() {
            if front.ts < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Varianza de la magnitud de movimiento (inquietud)
    pub fn movement_variance(&self) -> f64 {
        self.variance_by(|entry| entry.movement)
    }

    /// Varianza del bamboleo de orientación
    pub fn orientation_variance(&self, baseline_yaw: Option<f64>) -> f64 {
        self.variance_by(|entry| wobble(entry, baseline_yaw))
    }

    /// Varianza poblacional de una métrica sobre toda la ventana
    fn variance_by<F>(&self, metric: F) -> f64
    where
        F: Fn(&HistoryEntry) -> f64,
    {
        let n = self.entries.len();
        if n < 2 {
            return 0.0;
        }

        let mean = self.entries.iter().map(&metric).sum::<f64>() / n as f64;
        let sq_sum: f64 = self
            .entries
            .iter()
            .map(|entry| {
                let d = metric(entry) - mean;
                d * d
            })
            .sum();

        sq_sum / n as f64
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new()
    }
}
