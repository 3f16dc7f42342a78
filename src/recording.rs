use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::{SendTimeoutError, Sender};
use csv::{ReaderBuilder, Trim};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::PlatformError;
use crate::fusion::SensorFusion;
use crate::platform::{
    PermissionRequirement, PermissionState, PlatformCapabilities, SensorPlatform,
};
use crate::types::{MotionReading, OrientationReading, PostureFrame, SensorEvent};

const IPHONE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";

/// Paso máximo de espera del hilo de reproducción antes de revisar la parada
const PLAYBACK_POLL: Duration = Duration::from_millis(20);

/// Evento crudo con su marca de tiempo original
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedEvent {
    pub ts_ms: u64,
    pub event: SensorEvent,
}

/// Carga una grabación en formato ts_ms,kind,a,b,c
pub fn load_recording(path: impl AsRef<Path>) -> Result<Vec<RecordedEvent>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("No se pudo abrir la grabación {:?}", path))?;
    parse_recording(file).with_context(|| format!("Grabación inválida {:?}", path))
}

/// Lee una grabación desde cualquier lector. Las celdas vacías son valores ausentes.
pub fn parse_recording<R: Read>(reader: R) -> Result<Vec<RecordedEvent>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut events = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Fila {} ilegible", row))?;
        if record.len() < 5 {
            bail!("La fila {} no tiene 5 columnas", row);
        }

        let ts_ms: u64 = record[0]
            .parse()
            .with_context(|| format!("ts_ms inválido en fila {}", row))?;
        let a = parse_cell(&record[2], row)?;
        let b = parse_cell(&record[3], row)?;
        let c = parse_cell(&record[4], row)?;

        let event = match &record[1] {
            "orientation" => SensorEvent::Orientation(OrientationReading {
                alpha: a,
                beta: b,
                gamma: c,
            }),
            "motion" => SensorEvent::Motion(MotionReading { x: a, y: b, z: c }),
            other => bail!("Tipo de evento desconocido '{}' en fila {}", other, row),
        };
        events.push(RecordedEvent { ts_ms, event });
    }

    Ok(events)
}

fn parse_cell(cell: &str, row: usize) -> Result<Option<f64>> {
    if cell.is_empty() {
        return Ok(None);
    }
    let value: f64 = cell
        .parse()
        .with_context(|| format!("Valor '{}' inválido en fila {}", cell, row))?;
    Ok(Some(value))
}

/// Reproducción determinista sin reloj: un tick cada `emit_debounce_ms` desde
/// el primer evento. Antes de cada evento se disparan los ticks anteriores a él.
pub fn replay_offline(events: &[RecordedEvent], config: &EngineConfig) -> Vec<PostureFrame> {
    let mut ordered = events.to_vec();
    ordered.sort_by_key(|e| e.ts_ms);

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return Vec::new();
    };
    let step = config.emit_debounce_ms.max(1);
    let end = last.ts_ms.saturating_add(step);
    // None cuando el siguiente tick ya no cabe en u64
    let mut next_tick = Some(first.ts_ms);

    let mut fusion = SensorFusion::new(config);
    let mut frames = Vec::new();
    for recorded in &ordered {
        while let Some(at) = next_tick.filter(|&at| at < recorded.ts_ms) {
            frames.extend(fusion.tick(at));
            next_tick = at.checked_add(step);
        }
        fusion.handle_event(&recorded.event, recorded.ts_ms);
    }
    while let Some(at) = next_tick.filter(|&at| at <= end) {
        frames.extend(fusion.tick(at));
        next_tick = at.checked_add(step);
    }

    frames
}

struct Player {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Plataforma que reproduce una grabación en tiempo real por el canal de eventos
pub struct ReplayPlatform {
    /// Una grabación por sesión; la última se repite
    recordings: Vec<Arc<Vec<RecordedEvent>>>,
    attachments: AtomicUsize,
    capabilities: PlatformCapabilities,
    orientation_permission: PermissionState,
    motion_permission: PermissionState,
    player: Mutex<Option<Player>>,
}

impl ReplayPlatform {
    /// Teléfono con ambos sensores; los permisos requieren concesión y se conceden
    pub fn phone(events: Vec<RecordedEvent>) -> Self {
        Self {
            recordings: vec![Arc::new(events)],
            attachments: AtomicUsize::new(0),
            capabilities: PlatformCapabilities {
                has_orientation: true,
                has_motion: true,
                orientation_permission: PermissionRequirement::Required,
                motion_permission: PermissionRequirement::Required,
                user_agent: IPHONE_USER_AGENT.to_string(),
                max_touch_points: 5,
            },
            orientation_permission: PermissionState::Granted,
            motion_permission: PermissionState::Granted,
            player: Mutex::new(None),
        }
    }

    /// Grabación para la siguiente sesión (siguiente `attach_listeners`)
    pub fn then(mut self, events: Vec<RecordedEvent>) -> Self {
        self.recordings.push(Arc::new(events));
        self
    }

    /// Misma respuesta para ambas peticiones de permiso
    pub fn with_permission(mut self, state: PermissionState) -> Self {
        self.orientation_permission = state;
        self.motion_permission = state;
        self
    }

    pub fn with_capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn listeners_attached(&self) -> bool {
        self.player
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl SensorPlatform for ReplayPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities.clone()
    }

    fn request_orientation_permission(&self) -> Result<PermissionState, PlatformError> {
        Ok(self.orientation_permission)
    }

    fn request_motion_permission(&self) -> Result<PermissionState, PlatformError> {
        Ok(self.motion_permission)
    }

    fn attach_listeners(&self, tx: Sender<SensorEvent>) -> Result<(), PlatformError> {
        let mut player = self.player.lock().unwrap_or_else(PoisonError::into_inner);
        if player.is_some() {
            return Err(PlatformError::Attach("listeners already attached".to_string()));
        }

        let session = self.attachments.load(Ordering::SeqCst);
        let index = session.min(self.recordings.len().saturating_sub(1));
        let events = self
            .recordings
            .get(index)
            .cloned()
            .unwrap_or_default();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("replay-player".to_string())
            .spawn(move || play(&events, &tx, &stop_flag))
            .map_err(|e| PlatformError::Attach(e.to_string()))?;

        // solo un arranque con éxito consume la grabación de la sesión
        self.attachments.fetch_add(1, Ordering::SeqCst);
        debug!(session, "reproducción iniciada");
        *player = Some(Player { stop, handle });
        Ok(())
    }

    fn detach_listeners(&self) {
        let player = self
            .player
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(player) = player {
            player.stop.store(true, Ordering::SeqCst);
            let _ = player.handle.join();
            debug!("reproducción detenida");
        }
    }
}

impl Drop for ReplayPlatform {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

/// Envía cada evento respetando los intervalos originales
fn play(events: &[RecordedEvent], tx: &Sender<SensorEvent>, stop: &AtomicBool) {
    let started = Instant::now();
    let first_ts = events.first().map_or(0, |e| e.ts_ms);

    for recorded in events {
        let due = started + Duration::from_millis(recorded.ts_ms.saturating_sub(first_ts));
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= due {
                break;
            }
            thread::sleep((due - now).min(PLAYBACK_POLL));
        }

        let mut event = recorded.event;
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            match tx.send_timeout(event, PLAYBACK_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(pending)) => event = pending,
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
    debug!("grabación completa");
}
