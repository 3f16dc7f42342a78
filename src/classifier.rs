use crate::config::EngineConfig;
use crate::fallback::synthetic_frame;
use crate::history::{yaw_drift, SampleHistory};
use crate::types::{iso_timestamp, PostureFrame, CONFIDENT_HISTORY_LEN, FRAME_SOURCE};

const MOVEMENT_VAR_WEIGHT: f64 = 28.0;
const ORIENTATION_VAR_WEIGHT: f64 = 9.0;

const FORWARD_PENALTY_RATE: f64 = 1.9;
const FORWARD_PENALTY_CAP: f64 = 35.0;
const ROLL_PENALTY_RATE: f64 = 1.8;
const ROLL_PENALTY_CAP: f64 = 25.0;
const INSTABILITY_PENALTY_RATE: f64 = 0.45;
const INSTABILITY_PENALTY_CAP: f64 = 28.0;
const SUSTAINED_PENALTY_CAP: f64 = 18.0;

const CONFIDENCE_BASE: f64 = 0.35;
const CONFIDENCE_ORIENTATION: f64 = 0.35;
const CONFIDENCE_MOTION: f64 = 0.20;
const CONFIDENCE_HISTORY: f64 = 0.10;
const CONFIDENCE_MIN: f64 = 0.1;
const CONFIDENCE_MAX: f64 = 1.0;

/// Qué flujos de eventos han entregado datos en la sesión
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalPresence {
    pub orientation: bool,
    pub motion: bool,
}

/// Estabilidad 0-100 a partir de las dos varianzas de la ventana
pub fn stability_from(movement_var: f64, orientation_var: f64) -> f64 {
    let jitter = (movement_var * MOVEMENT_VAR_WEIGHT + orientation_var * ORIENTATION_VAR_WEIGHT)
        .max(0.0)
        .sqrt();
    (100.0 - jitter).clamp(0.0, 100.0)
}

/// Confianza según la disponibilidad de señal
pub fn confidence_for(presence: SignalPresence, history_len: usize) -> f64 {
    let mut confidence = CONFIDENCE_BASE;
    if presence.orientation {
        confidence += CONFIDENCE_ORIENTATION;
    }
    if presence.motion {
        confidence += CONFIDENCE_MOTION;
    }
    if history_len >= CONFIDENT_HISTORY_LEN {
        confidence += CONFIDENCE_HISTORY;
    }
    confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Componentes de penalización de la puntuación, cada uno con su tope
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScorePenalties {
    pub forward: f64,
    pub roll: f64,
    pub instability: f64,
    pub sustained: f64,
}

impl ScorePenalties {
    pub fn compute(
        config: &EngineConfig,
        pitch: f64,
        roll: f64,
        stability: f64,
        sustained_bad_ms: u64,
    ) -> Self {
        Self {
            forward: ((pitch - config.forward_threshold_deg) * FORWARD_PENALTY_RATE)
                .clamp(0.0, FORWARD_PENALTY_CAP),
            roll: ((roll.abs() - config.roll_threshold_deg) * ROLL_PENALTY_RATE)
                .clamp(0.0, ROLL_PENALTY_CAP),
            instability: ((100.0 - stability) * INSTABILITY_PENALTY_RATE)
                .clamp(0.0, INSTABILITY_PENALTY_CAP),
            sustained: (sustained_bad_ms as f64 / 1000.0).clamp(0.0, SUSTAINED_PENALTY_CAP),
        }
    }

    pub fn total(&self) -> f64 {
        self.forward + self.roll + self.instability + self.sustained
    }

    /// 100 menos la suma de penalizaciones, en [0, 100]
    pub fn score(&self) -> f64 {
        (100.0 - self.total()).clamp(0.0, 100.0)
    }
}

/// Clasificador de postura con histéresis y acumulador de "mala postura sostenida".
/// Estados de la histéresis:
/// - sin inclinación: `forward_lean_at = None`
/// - inclinado: `forward_lean_at = Some(inicio)`, slouch cuando dura
///   `slouch_sustain_ms` y además hay inestabilidad
#[derive(Debug, Clone, PartialEq)]
pub struct PostureClassifier {
    config: EngineConfig,
    forward_lean_at: Option<u64>,
    sustained_bad_ms: u64,
    last_classified_at: Option<u64>,
}

impl PostureClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            forward_lean_at: None,
            sustained_bad_ms: 0,
            last_classified_at: None,
        }
    }

    /// Calcula el frame para `now` a partir del historial.
    /// Con historial vacío devuelve el frame sintético.
    ///
    /// Se llama una vez por tick de emisión: el acumulador sube lo transcurrido
    /// desde la clasificación anterior y baja `emit_debounce_ms` por tick bueno.
    pub fn classify(
        &mut self,
        history: &SampleHistory,
        baseline_yaw: Option<f64>,
        presence: SignalPresence,
        now: u64,
    ) -> PostureFrame {
        let Some(latest) = history.latest() else {
            return synthetic_frame(now);
        };

        let pitch = latest.pitch;
        let roll = latest.roll;
        let drift = yaw_drift(latest.yaw, baseline_yaw);

        let stability = stability_from(
            history.movement_variance(),
            history.orientation_variance(baseline_yaw),
        );
        let unstable = stability < self.config.unstable_cutoff();
        let forward_lean = pitch > self.config.forward_threshold_deg;
        let side_tilt = roll.abs() > self.config.roll_threshold_deg;

        // Histéresis: se reinicia en cuanto deja de haber inclinación
        if forward_lean {
            self.forward_lean_at.get_or_insert(now);
        } else {
            self.forward_lean_at = None;
        }
        let slouch = unstable
            && self
                .forward_lean_at
                .is_some_and(|since| now.saturating_sub(since) >= self.config.slouch_sustain_ms);

        let elapsed = self
            .last_classified_at
            .map_or(0, |last| now.saturating_sub(last));
        self.last_classified_at = Some(now);
        if forward_lean || side_tilt || unstable {
            self.sustained_bad_ms = self.sustained_bad_ms.saturating_add(elapsed);
        } else {
            self.sustained_bad_ms = self
                .sustained_bad_ms
                .saturating_sub(self.config.emit_debounce_ms);
        }

        let penalties =
            ScorePenalties::compute(&self.config, pitch, roll, stability, self.sustained_bad_ms);

        PostureFrame {
            score: penalties.score(),
            forward_lean,
            side_tilt,
            unstable,
            slouch,
            confidence: confidence_for(presence, history.len()),
            yaw_drift: drift,
            pitch,
            roll,
            stability,
            source: FRAME_SOURCE,
            ts: now,
            iso_timestamp: iso_timestamp(now),
        }
    }

    /// Instante en que empezó la inclinación actual
    pub fn forward_lean_since(&self) -> Option<u64> {
        self.forward_lean_at
    }

    pub fn sustained_bad_ms(&self) -> u64 {
        self.sustained_bad_ms
    }

    pub fn reset(&mut self) {
        self.forward_lean_at = None;
        self.sustained_bad_ms = 0;
        self.last_classified_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistoryEntry;

    fn steady_history(pitch: f64, roll: f64, from: u64, to: u64) -> SampleHistory {
        let mut history = SampleHistory::new();
        let mut ts = from;
        while ts <= to {
            history.push(HistoryEntry {
                ts,
                pitch,
                roll,
                yaw: 0.0,
                movement: 9.81,
            });
            ts += 66;
        }
        history
    }

    const BOTH: SignalPresence = SignalPresence {
        orientation: true,
        motion: true,
    };

    #[test]
    fn test_stability_bounds() {
        assert_eq!(stability_from(0.0, 0.0), 100.0);
        assert_eq!(stability_from(1e9, 1e9), 0.0);
        // sqrt(9·28 + 0) ≈ 15.87
        assert!((stability_from(9.0, 0.0) - (100.0 - 252f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_levels() {
        let none = SignalPresence::default();
        assert!((confidence_for(none, 0) - 0.35).abs() < 1e-9);
        assert!((confidence_for(BOTH, 5) - 0.90).abs() < 1e-9);
        assert!((confidence_for(BOTH, 20) - 1.0).abs() < 1e-9);
        let motion_only = SignalPresence {
            orientation: false,
            motion: true,
        };
        assert!((confidence_for(motion_only, 25) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_penalties_are_capped() {
        let config = EngineConfig::default();
        let p = ScorePenalties::compute(&config, 170.0, -170.0, 0.0, 1_000_000);
        assert_eq!(p.forward, 35.0);
        assert_eq!(p.roll, 25.0);
        assert_eq!(p.instability, 28.0);
        assert_eq!(p.sustained, 18.0);
        assert_eq!(p.score(), 0.0);
    }

    #[test]
    fn test_penalties_zero_for_good_posture() {
        let config = EngineConfig::default();
        let p = ScorePenalties::compute(&config, -30.0, 10.0, 100.0, 0);
        assert_eq!(p.total(), 0.0);
        assert_eq!(p.score(), 100.0);
    }

    #[test]
    fn test_empty_history_gives_synthetic() {
        let mut classifier = PostureClassifier::new(&EngineConfig::default());
        let frame = classifier.classify(&SampleHistory::new(), None, BOTH, 5_000);
        assert_eq!(frame.confidence, 0.25);
        assert!(!frame.has_fault());
        assert!(classifier.forward_lean_since().is_none());
    }

    #[test]
    fn test_good_posture_frame() {
        let mut classifier = PostureClassifier::new(&EngineConfig::default());
        let history = steady_history(5.0, 2.0, 0, 3000);
        let frame = classifier.classify(&history, Some(0.0), BOTH, 3000);
        assert!(!frame.forward_lean);
        assert!(!frame.side_tilt);
        assert!(!frame.unstable);
        assert!(!frame.slouch);
        assert_eq!(frame.stability, 100.0);
        assert_eq!(frame.score, 100.0);
        assert_eq!(frame.confidence, 1.0);
    }

    #[test]
    fn test_forward_lean_timer_resets_instantly() {
        let mut classifier = PostureClassifier::new(&EngineConfig::default());
        let leaning = steady_history(25.0, 0.0, 0, 660);
        classifier.classify(&leaning, Some(0.0), BOTH, 660);
        assert_eq!(classifier.forward_lean_since(), Some(660));
        classifier.classify(&leaning, Some(0.0), BOTH, 726);
        assert_eq!(classifier.forward_lean_since(), Some(660));

        let upright = steady_history(0.0, 0.0, 0, 792);
        classifier.classify(&upright, Some(0.0), BOTH, 792);
        assert!(classifier.forward_lean_since().is_none());
    }

    #[test]
    fn test_steady_lean_never_slouches() {
        // inclinación sostenida pero estable: no hay slouch
        let mut classifier = PostureClassifier::new(&EngineConfig::default());
        let history = steady_history(25.0, 0.0, 0, 4000);
        classifier.classify(&history, Some(0.0), BOTH, 0);
        let frame = classifier.classify(&history, Some(0.0), BOTH, 4000);
        assert!(frame.forward_lean);
        assert!(!frame.unstable);
        assert!(!frame.slouch);
    }

    #[test]
    fn test_leaky_bucket_fills_and_drains() {
        let config = EngineConfig::default();
        let mut classifier = PostureClassifier::new(&config);
        let tilted = steady_history(0.0, 30.0, 0, 1000);
        for ts in (0..=1000).step_by(200) {
            classifier.classify(&tilted, Some(0.0), BOTH, ts);
        }
        assert_eq!(classifier.sustained_bad_ms(), 1000);

        let upright = steady_history(0.0, 0.0, 0, 1000);
        for i in 1..=3 {
            classifier.classify(&upright, Some(0.0), BOTH, 1000 + i * 200);
        }
        assert_eq!(classifier.sustained_bad_ms(), 400);
        for i in 4..=10 {
            classifier.classify(&upright, Some(0.0), BOTH, 1000 + i * 200);
        }
        assert_eq!(classifier.sustained_bad_ms(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let config = EngineConfig::default();
        let mut classifier = PostureClassifier::new(&config);
        let history = steady_history(30.0, 30.0, 0, 500);
        classifier.classify(&history, None, BOTH, 0);
        classifier.classify(&history, None, BOTH, 500);
        classifier.reset();
        assert_eq!(classifier, PostureClassifier::new(&config));
    }
}
