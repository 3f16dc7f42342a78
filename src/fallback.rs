use crate::types::{iso_timestamp, PostureFrame, FRAME_SOURCE};

/// Confianza fija de la señal sintética
pub const SYNTHETIC_CONFIDENCE: f64 = 0.25;

const IDLE_SCORE_CENTER: f64 = 66.0;
const IDLE_SCORE_AMPLITUDE: f64 = 8.0;
const IDLE_SCORE_RATE: f64 = 0.37;

/// Puntuación en reposo: 66 + 8·sin(t·0.37), con t en segundos
pub fn synthetic_score(ts: u64) -> f64 {
    let t = ts as f64 / 1000.0;
    IDLE_SCORE_CENTER + IDLE_SCORE_AMPLITUDE * (t * IDLE_SCORE_RATE).sin()
}

/// Frame determinista de baja confianza para cuando no hay señal real.
/// Nunca marca defectos: la falta de señal se comunica solo con la confianza.
pub fn synthetic_frame(ts: u64) -> PostureFrame {
    PostureFrame {
        score: synthetic_score(ts),
        forward_lean: false,
        side_tilt: false,
        unstable: false,
        slouch: false,
        confidence: SYNTHETIC_CONFIDENCE,
        yaw_drift: 0.0,
        pitch: 0.0,
        roll: 0.0,
        stability: 100.0,
        source: FRAME_SOURCE,
        ts,
        iso_timestamp: iso_timestamp(ts),
    }
}
