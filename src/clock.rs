use std::time::Instant;

/// Reloj de sesión: milisegundos de pared fijados una vez con `chrono` y
/// avanzados con `Instant`, así un ajuste del reloj del sistema no rompe la
/// monotonía del historial.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
    epoch_ms: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        let epoch_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        Self {
            origin: Instant::now(),
            epoch_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.at(Instant::now())
    }

    /// Marca de tiempo de un `Instant` concreto (p. ej. la entrega de un tick)
    pub fn at(&self, instant: Instant) -> u64 {
        let elapsed = instant.saturating_duration_since(self.origin).as_millis();
        self.epoch_ms
            .saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
