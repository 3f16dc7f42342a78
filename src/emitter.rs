use crate::types::PostureFrame;

/// Compuerta temporal: deja pasar como mucho un evento por `interval_ms`.
/// Se usa por separado para el muestreo y para la emisión.
#[derive(Debug, Clone, PartialEq)]
pub struct RateGate {
    interval_ms: u64,
    last_pass_at: Option<u64>,
}

impl RateGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_pass_at: None,
        }
    }

    /// true si ya pasó el intervalo desde el último paso
    pub fn is_open(&self, now: u64) -> bool {
        match self.last_pass_at {
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
            None => true,
        }
    }

    /// Comprueba y, si está abierta, registra el paso
    pub fn try_pass(&mut self, now: u64) -> bool {
        if self.is_open(now) {
            self.last_pass_at = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_pass_at(&self) -> Option<u64> {
        self.last_pass_at
    }

    pub fn reset(&mut self) {
        self.last_pass_at = None;
    }
}

/// Emisor con anti-rebote: en cada tick con la compuerta abierta construye
/// un frame nuevo, haya llegado o no una muestra desde el anterior.
#[derive(Debug, Clone, PartialEq)]
pub struct DebouncedEmitter {
    gate: RateGate,
}

impl DebouncedEmitter {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            gate: RateGate::new(debounce_ms),
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.gate.is_open(now)
    }

    /// Construye y entrega el frame solo si la compuerta está abierta.
    /// Con la compuerta cerrada `build` no se ejecuta.
    pub fn emit_with<F>(&mut self, now: u64, build: F) -> Option<PostureFrame>
    where
        F: FnOnce() -> PostureFrame,
    {
        if self.gate.try_pass(now) {
            Some(build())
        } else {
            None
        }
    }

    pub fn last_emit_at(&self) -> Option<u64> {
        self.gate.last_pass_at()
    }

    pub fn reset(&mut self) {
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::synthetic_frame;

    #[test]
    fn test_gate_first_pass_open() {
        let mut gate = RateGate::new(66);
        assert!(gate.try_pass(1_000));
        assert!(!gate.try_pass(1_065));
        assert!(gate.try_pass(1_066));
        assert_eq!(gate.last_pass_at(), Some(1_066));
    }

    #[test]
    fn test_gate_reset() {
        let mut gate = RateGate::new(200);
        assert!(gate.try_pass(500));
        gate.reset();
        assert!(gate.try_pass(501));
    }

    #[test]
    fn test_emitter_builds_on_every_open_tick() {
        let mut emitter = DebouncedEmitter::new(200);
        let frames: Vec<_> = (0..5u64)
            .filter_map(|i| emitter.emit_with(i * 200, || synthetic_frame(i * 200)))
            .collect();
        assert_eq!(frames.len(), 5);
        assert_eq!(emitter.last_emit_at(), Some(800));
    }

    #[test]
    fn test_emitter_debounce_skips_build() {
        let mut emitter = DebouncedEmitter::new(200);
        assert!(emitter.emit_with(0, || synthetic_frame(0)).is_some());
        let mut built = false;
        let skipped = emitter.emit_with(100, || {
            built = true;
            synthetic_frame(100)
        });
        assert!(skipped.is_none());
        assert!(!built);
        assert!(!emitter.is_due(199));
        assert!(emitter.emit_with(200, || synthetic_frame(200)).is_some());
    }
}
