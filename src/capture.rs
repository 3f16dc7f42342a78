use crate::types::{MotionReading, MotionSample, OrientationReading, OrientationSample};

/// Sustituye valores ausentes o no finitos por 0
pub fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Lleva un ángulo a [-180, 180) con módulo euclídeo
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Normaliza una lectura cruda de orientación
pub fn capture_orientation(reading: &OrientationReading, ts: u64) -> OrientationSample {
    OrientationSample {
        ts,
        alpha: normalize_angle(sanitize(reading.alpha)),
        beta: normalize_angle(sanitize(reading.beta)),
        gamma: normalize_angle(sanitize(reading.gamma)),
    }
}

/// Sanea una lectura cruda de aceleración
pub fn capture_motion(reading: &MotionReading, ts: u64) -> MotionSample {
    MotionSample {
        ts,
        x: sanitize(reading.x),
        y: sanitize(reading.y),
        z: sanitize(reading.z),
    }
}
