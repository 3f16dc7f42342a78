use tracing::trace;

use crate::capture::{capture_motion, capture_orientation};
use crate::classifier::{PostureClassifier, SignalPresence};
use crate::config::EngineConfig;
use crate::emitter::{DebouncedEmitter, RateGate};
use crate::history::SampleHistory;
use crate::types::{HistoryEntry, MotionReading, OrientationReading, PostureFrame, SensorEvent};

/// Estado de una sesión de fusión (un solo escritor).
///
/// No lee ningún reloj: cada operación recibe `now` en milisegundos, de modo
/// que el motor en vivo, la reproducción offline y los tests comparten el
/// mismo camino.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFusion {
    config: EngineConfig,
    pitch: f64,
    roll: f64,
    yaw: f64,
    movement: f64,
    presence: SignalPresence,
    history: SampleHistory,
    baseline_yaw: Option<f64>,
    sample_gate: RateGate,
    classifier: PostureClassifier,
    emitter: DebouncedEmitter,
}

impl SensorFusion {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
            movement: 0.0,
            presence: SignalPresence::default(),
            history: SampleHistory::new(),
            baseline_yaw: None,
            sample_gate: RateGate::new(config.sample_interval_ms),
            classifier: PostureClassifier::new(config),
            emitter: DebouncedEmitter::new(config.emit_debounce_ms),
        }
    }

    /// Evento de orientación: alpha → yaw, beta → pitch, gamma → roll.
    /// Devuelve true si produjo una muestra nueva en el historial.
    pub fn on_orientation(&mut self, reading: &OrientationReading, now: u64) -> bool {
        let sample = capture_orientation(reading, now);
        self.yaw = sample.alpha;
        self.pitch = sample.beta;
        self.roll = sample.gamma;
        self.presence.orientation = true;
        self.capture_sample(now)
    }

    /// Evento de aceleración (con gravedad), reducido a magnitud
    pub fn on_motion(&mut self, reading: &MotionReading, now: u64) -> bool {
        let sample = capture_motion(reading, now);
        self.movement = sample.magnitude();
        self.presence.motion = true;
        self.capture_sample(now)
    }

    pub fn handle_event(&mut self, event: &SensorEvent, now: u64) -> bool {
        match event {
            SensorEvent::Orientation(reading) => self.on_orientation(reading, now),
            SensorEvent::Motion(reading) => self.on_motion(reading, now),
        }
    }

    /// Único punto de mutación del historial
    fn capture_sample(&mut self, now: u64) -> bool {
        if !self.sample_gate.try_pass(now) {
            return false;
        }

        if self.baseline_yaw.is_none() && self.presence.orientation {
            self.baseline_yaw = Some(self.yaw);
        }

        self.history.push(HistoryEntry {
            ts: now,
            pitch: self.pitch,
            roll: self.roll,
            yaw: self.yaw,
            movement: self.movement,
        });
        trace!(ts = now, len = self.history.len(), "muestra aceptada");
        true
    }

    /// Tick de cadencia. Con la compuerta de emisión abierta clasifica el
    /// historial en `now` aunque no haya llegado ninguna muestra desde el tick
    /// anterior; sin historial el frame es el sintético.
    pub fn tick(&mut self, now: u64) -> Option<PostureFrame> {
        self.history.prune(now);
        let Self {
            history,
            baseline_yaw,
            presence,
            classifier,
            emitter,
            ..
        } = self;
        emitter.emit_with(now, || classifier.classify(history, *baseline_yaw, *presence, now))
    }

    /// true mientras no haya llegado ninguna muestra real a la ventana
    pub fn is_idle(&self) -> bool {
        self.history.is_empty()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn baseline_yaw(&self) -> Option<f64> {
        self.baseline_yaw
    }

    pub fn presence(&self) -> SignalPresence {
        self.presence
    }

    /// Milisegundos acumulados de mala postura
    pub fn sustained_bad_ms(&self) -> u64 {
        self.classifier.sustained_bad_ms()
    }

    /// Deja el estado como recién creado: historial, línea base de rumbo,
    /// temporizadores y acumuladores.
    pub fn reset(&mut self) {
        self.pitch = 0.0;
        self.roll = 0.0;
        self.yaw = 0.0;
        self.movement = 0.0;
        self.presence = SignalPresence::default();
        self.history.clear();
        self.baseline_yaw = None;
        self.sample_gate.reset();
        self.classifier.reset();
        self.emitter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::SYNTHETIC_CONFIDENCE;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const T0: u64 = 10_000;

    fn fusion() -> SensorFusion {
        SensorFusion::new(&EngineConfig::default())
    }

    /// Alimenta eventos cada 20 ms (movimiento y luego orientación) durante
    /// `duration_ms` y hace tick cada 200 ms. Devuelve los frames emitidos.
    fn drive<F>(fusion: &mut SensorFusion, duration_ms: u64, mut events: F) -> Vec<PostureFrame>
    where
        F: FnMut(u64) -> (MotionReading, OrientationReading),
    {
        let mut frames = Vec::new();
        for k in (0..=duration_ms).step_by(20) {
            let now = T0 + k;
            let (motion, orientation) = events(k);
            fusion.on_motion(&motion, now);
            fusion.on_orientation(&orientation, now);
            if k % 200 == 0 {
                frames.extend(fusion.tick(now));
            }
        }
        frames
    }

    #[test]
    fn test_slouching_while_rocking() {
        // inclinación hacia delante hasta 22°, sacudidas de ±3 y balanceo lateral
        let mut fusion = fusion();
        let frames = drive(&mut fusion, 3000, |k| {
            let shake = if (k / 20) % 2 == 0 { 3.0 } else { -3.0 };
            let beta = 22.0 * (k as f64 / 400.0).min(1.0);
            let gamma = if (k / 400) % 2 == 1 { 24.0 } else { 0.0 };
            (
                MotionReading::new(0.0, 0.0, 9.81 + shake),
                OrientationReading::new(0.0, beta, gamma),
            )
        });

        let last = frames.last().unwrap();
        assert!(last.forward_lean);
        assert!(last.unstable);
        assert!(last.slouch);
        assert!(last.score < 60.0, "score {}", last.score);
        assert_abs_diff_eq!(last.confidence, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_good_posture_steady() {
        let mut fusion = fusion();
        let frames = drive(&mut fusion, 3000, |_| {
            (
                MotionReading::new(0.0, 0.0, 9.81),
                OrientationReading::new(0.0, 5.0, 2.0),
            )
        });

        let last = frames.last().unwrap();
        assert!(!last.forward_lean);
        assert!(!last.side_tilt);
        assert!(!last.unstable);
        assert!(!last.slouch);
        assert!(last.score > 85.0, "score {}", last.score);
        assert_abs_diff_eq!(last.pitch, 5.0);
        assert_abs_diff_eq!(last.roll, 2.0);
    }

    /// Inclinación de 25° con sacudidas alineadas a la cadencia de muestreo
    fn shaky_lean(lean_until: u64) -> impl FnMut(u64) -> (MotionReading, OrientationReading) {
        move |k| {
            let shake = if (k / 80) % 2 == 0 { 8.0 } else { -8.0 };
            let beta = if k < lean_until { 25.0 } else { 0.0 };
            (
                MotionReading::new(0.0, 0.0, 9.81 + shake),
                OrientationReading::new(0.0, beta, 0.0),
            )
        }
    }

    #[test]
    fn test_brief_lean_never_slouches() {
        let mut fusion = fusion();
        let frames = drive(&mut fusion, 4000, shaky_lean(2000));
        assert!(frames.iter().any(|f| f.forward_lean && f.unstable));
        assert!(frames.iter().all(|f| !f.slouch));
        assert!(!frames.last().unwrap().forward_lean);
    }

    #[test]
    fn test_sustained_unstable_lean_slouches() {
        let mut fusion = fusion();
        let frames = drive(&mut fusion, 3000, shaky_lean(u64::MAX));
        let last = frames.last().unwrap();
        assert!(last.forward_lean);
        assert!(last.unstable);
        assert!(last.slouch);
        // el primer tercio de la sesión no alcanza el umbral de 2500 ms
        assert!(frames.iter().take(5).all(|f| !f.slouch));
    }

    #[test]
    fn test_single_sample_keeps_cadence() {
        let mut fusion = fusion();
        fusion.on_orientation(&OrientationReading::new(0.0, 5.0, 0.0), T0);
        let frames: Vec<_> = (0..20u64).filter_map(|i| fusion.tick(T0 + i * 200)).collect();
        assert_eq!(frames.len(), 20);
        assert!(frames.iter().all(|f| f.confidence > SYNTHETIC_CONFIDENCE));
        assert_eq!(frames.last().unwrap().ts, T0 + 3_800);
    }

    #[test]
    fn test_slow_hardware_emits_every_tick() {
        // un evento cada 600 ms, ticks cada 200 ms
        let mut fusion = fusion();
        let mut frames = Vec::new();
        for k in (0..=3000u64).step_by(200) {
            let now = T0 + k;
            if k % 600 == 0 {
                fusion.on_orientation(&OrientationReading::new(0.0, 5.0, 2.0), now);
            }
            frames.extend(fusion.tick(now));
        }
        assert_eq!(frames.len(), 16);
        assert!(frames.windows(2).all(|w| w[1].ts - w[0].ts == 200));
        assert!(frames.iter().all(|f| f.confidence > SYNTHETIC_CONFIDENCE));
    }

    #[test]
    fn test_slouch_timer_runs_through_pause() {
        let mut fusion = fusion();
        let mut frames = drive(&mut fusion, 1000, shaky_lean(u64::MAX));
        assert!(frames.iter().all(|f| !f.slouch));

        // sin eventos nuevos, dentro de la ventana de 5 s
        for k in (1200..=3000u64).step_by(200) {
            frames.extend(fusion.tick(T0 + k));
        }
        assert_eq!(frames.len(), 16);
        let last = frames.last().unwrap();
        assert!(last.forward_lean && last.unstable);
        assert!(last.slouch);
    }

    #[test]
    fn test_bucket_drains_at_fill_rate() {
        // umbral tal que la inestabilidad nunca se activa
        let config = EngineConfig {
            unstable_threshold: 25.0,
            ..EngineConfig::default()
        };
        let mut fusion = SensorFusion::new(&config);
        drive(&mut fusion, 1000, |_| {
            (
                MotionReading::new(0.0, 0.0, 9.81),
                OrientationReading::new(0.0, 0.0, 30.0),
            )
        });
        assert_eq!(fusion.sustained_bad_ms(), 1000);

        for k in (1020..=1400u64).step_by(20) {
            let now = T0 + k;
            fusion.on_orientation(&OrientationReading::new(0.0, 0.0, 0.0), now);
            if k % 200 == 0 {
                fusion.tick(now);
            }
        }
        assert_eq!(fusion.sustained_bad_ms(), 600);
    }

    #[test]
    fn test_debounce_burst_emits_once() {
        let mut fusion = fusion();
        let mut emitted = 0;
        for i in 0..100u64 {
            let now = T0 + i * 2;
            fusion.on_orientation(&OrientationReading::new(0.0, 10.0, 0.0), now);
            if fusion.tick(now).is_some() {
                emitted += 1;
            }
        }
        assert!(emitted <= 1);
    }

    #[test]
    fn test_sample_gate_limits_history() {
        let mut fusion = fusion();
        let accepted = (0..100u64)
            .filter(|i| fusion.on_motion(&MotionReading::new(0.0, 0.0, 9.81), T0 + i * 10))
            .count();
        // 990 ms a 10 ms por evento: una muestra cada 70 ms
        assert_eq!(accepted, 15);
        assert_eq!(fusion.history().len(), 15);
    }

    #[test]
    fn test_empty_history_emits_synthetic() {
        let mut fusion = fusion();
        let frame = fusion.tick(T0).unwrap();
        assert_eq!(frame.confidence, SYNTHETIC_CONFIDENCE);
        assert!(!frame.has_fault());
        assert!((58.0..=74.0).contains(&frame.score));
        // misma cadencia que los frames reales
        assert!(fusion.tick(T0 + 100).is_none());
        assert!(fusion.tick(T0 + 200).is_some());
        assert!(fusion.is_idle());
    }

    #[test]
    fn test_stale_window_falls_back() {
        let mut fusion = fusion();
        fusion.on_orientation(&OrientationReading::new(0.0, 30.0, 0.0), T0);
        let real = fusion.tick(T0).unwrap();
        assert!(real.forward_lean);

        // sin eventos durante más de la ventana
        let frame = fusion.tick(T0 + 5_001).unwrap();
        assert_eq!(frame.confidence, SYNTHETIC_CONFIDENCE);
        assert!(fusion.is_idle());
    }

    #[test]
    fn test_baseline_from_first_orientation() {
        let mut fusion = fusion();
        fusion.on_motion(&MotionReading::new(0.0, 0.0, 9.81), T0);
        assert!(fusion.baseline_yaw().is_none());
        fusion.on_orientation(&OrientationReading::new(40.0, 0.0, 0.0), T0 + 100);
        assert_eq!(fusion.baseline_yaw(), Some(40.0));
        fusion.on_orientation(&OrientationReading::new(70.0, 0.0, 0.0), T0 + 200);
        assert_eq!(fusion.baseline_yaw(), Some(40.0));
        let frame = fusion.tick(T0 + 200).unwrap();
        assert_abs_diff_eq!(frame.yaw_drift, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_restart_isolation() {
        let mut fusion = fusion();
        fusion.on_orientation(&OrientationReading::new(170.0, 0.0, 0.0), T0);
        fusion.tick(T0);
        fusion.reset();

        fusion.on_orientation(&OrientationReading::new(10.0, 0.0, 0.0), T0 + 1_000);
        let frame = fusion.tick(T0 + 1_000).unwrap();
        assert_abs_diff_eq!(frame.yaw_drift, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reset_twice_same_as_once() {
        let mut fusion = fusion();
        drive(&mut fusion, 1000, shaky_lean(u64::MAX));
        fusion.reset();
        let once = fusion.clone();
        fusion.reset();
        assert_eq!(fusion, once);
        assert_eq!(once, SensorFusion::new(&EngineConfig::default()));
    }

    #[test]
    fn test_confidence_tracks_streams() {
        let mut fusion = fusion();
        fusion.on_motion(&MotionReading::new(0.0, 0.0, 9.81), T0);
        let frame = fusion.tick(T0).unwrap();
        assert_abs_diff_eq!(frame.confidence, 0.55, epsilon = 1e-9);

        fusion.on_orientation(&OrientationReading::new(0.0, 0.0, 0.0), T0 + 100);
        let frame = fusion.tick(T0 + 200).unwrap();
        assert_abs_diff_eq!(frame.confidence, 0.90, epsilon = 1e-9);
    }

    #[test]
    fn test_random_input_stays_bounded() {
        let pool = [
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            1e300,
            -1e300,
            0.0,
            720.5,
            -359.9,
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let value = |rng: &mut StdRng| -> Option<f64> {
            match rng.gen_range(0..10) {
                0 => None,
                1..=3 => Some(pool[rng.gen_range(0..pool.len())]),
                _ => Some(rng.gen_range(-400.0..400.0)),
            }
        };

        let config = EngineConfig {
            unstable_threshold: 2.0,
            ..EngineConfig::default()
        };
        let mut fusion = SensorFusion::new(&config);
        let mut now = T0;
        let mut frames = 0;
        for _ in 0..5_000 {
            now += rng.gen_range(0..40);
            if rng.gen_bool(0.5) {
                let reading = OrientationReading {
                    alpha: value(&mut rng),
                    beta: value(&mut rng),
                    gamma: value(&mut rng),
                };
                fusion.on_orientation(&reading, now);
            } else {
                let reading = MotionReading {
                    x: value(&mut rng),
                    y: value(&mut rng),
                    z: value(&mut rng),
                };
                fusion.on_motion(&reading, now);
            }
            if let Some(frame) = fusion.tick(now) {
                frames += 1;
                assert!((0.0..=100.0).contains(&frame.score), "{:?}", frame);
                assert!((0.0..=100.0).contains(&frame.stability), "{:?}", frame);
                assert!((0.1..=1.0).contains(&frame.confidence), "{:?}", frame);
                assert!(frame.yaw_drift >= 0.0 && frame.yaw_drift <= 180.0);
                assert!(frame.pitch.is_finite() && frame.roll.is_finite());
            }
        }
        assert!(frames > 0);
    }
}
