use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::availability::probe;
use crate::clock::SessionClock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fusion::SensorFusion;
use crate::permission::negotiate;
use crate::platform::{EngineStats, SensorPlatform, StatsSnapshot};
use crate::types::{PostureFrame, SensorEvent};

/// Mensaje entregado a `on_error` cuando se deniega el acceso a los sensores
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Motion sensor permission denied; continuing with synthetic posture signal";

/// Capacidad de la cola entre los listeners de la plataforma y el hilo de fusión
const EVENT_QUEUE_CAPACITY: usize = 256;

pub type FrameCallback = Arc<dyn Fn(&PostureFrame) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Origen de los frames de la sesión en curso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Sensor,
    Fallback,
}

struct Session {
    mode: EngineMode,
    stop_tx: Sender<()>,
    worker: JoinHandle<SensorFusion>,
}

/// Controlador de ciclo de vida: sondeo, permisos, listeners y el hilo
/// `posture-fusion`, que es el único escritor del estado de fusión.
pub struct PostureEngine<P: SensorPlatform + 'static> {
    platform: Arc<P>,
    config: EngineConfig,
    clock: SessionClock,
    on_frame: FrameCallback,
    on_error: ErrorCallback,
    stats: Arc<EngineStats>,
    /// Estado aparcado mientras no hay sesión
    fusion: Option<SensorFusion>,
    session: Option<Session>,
}

impl<P: SensorPlatform + 'static> PostureEngine<P> {
    pub fn new(platform: P, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            platform: Arc::new(platform),
            fusion: Some(SensorFusion::new(&config)),
            config,
            clock: SessionClock::new(),
            on_frame: Arc::new(|_: &PostureFrame| {}),
            on_error: Arc::new(|_: &str| {}),
            stats: Arc::new(EngineStats::default()),
            session: None,
        })
    }

    pub fn on_frame<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PostureFrame) + Send + Sync + 'static,
    {
        self.on_frame = Arc::new(callback);
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(callback);
        self
    }

    /// Arranca una sesión. Si ya hay una en marcha no hace nada.
    /// Sin soporte o sin permiso la sesión arranca igualmente en modo sintético.
    pub fn start(&mut self) -> Result<EngineMode, EngineError> {
        if let Some(session) = &self.session {
            debug!("start() con sesión activa, se ignora");
            return Ok(session.mode);
        }

        let capabilities = self.platform.capabilities();
        let availability = probe(&capabilities, self.config.device_override);
        info!(
            supported = availability.supported,
            phone = availability.is_phone,
            orientation = availability.has_orientation,
            motion = availability.has_motion,
            "sondeo de sensores"
        );

        let (event_tx, event_rx) = bounded::<SensorEvent>(EVENT_QUEUE_CAPACITY);
        let mode = if !availability.supported {
            EngineMode::Fallback
        } else if !negotiate(self.platform.as_ref(), &capabilities) {
            warn!("permiso de sensores denegado, usando señal sintética");
            (self.on_error)(PERMISSION_DENIED_MESSAGE);
            EngineMode::Fallback
        } else {
            match self.platform.attach_listeners(event_tx) {
                Ok(()) => EngineMode::Sensor,
                Err(e) => {
                    warn!(error = %e, "no se pudieron registrar los listeners");
                    EngineMode::Fallback
                }
            }
        };

        let events = match mode {
            EngineMode::Sensor => event_rx,
            EngineMode::Fallback => never(),
        };
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker = FusionWorker {
            fusion: self
                .fusion
                .take()
                .unwrap_or_else(|| SensorFusion::new(&self.config)),
            events,
            stop_rx,
            clock: self.clock,
            cadence: Duration::from_millis(self.config.emit_debounce_ms),
            on_frame: Arc::clone(&self.on_frame),
            stats: Arc::clone(&self.stats),
        };

        let handle = thread::Builder::new()
            .name("posture-fusion".to_string())
            .spawn(move || worker.run());
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                if mode == EngineMode::Sensor {
                    self.platform.detach_listeners();
                }
                return Err(EngineError::Spawn(e));
            }
        };

        info!(?mode, "motor de postura iniciado");
        self.session = Some(Session {
            mode,
            stop_tx,
            worker: handle,
        });
        Ok(mode)
    }

    /// Detiene la sesión y deja el estado como nuevo. Idempotente.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            if let Some(fusion) = self.fusion.as_mut() {
                fusion.reset();
            }
            return;
        };

        if session.mode == EngineMode::Sensor {
            self.platform.detach_listeners();
        }
        let _ = session.stop_tx.send(());

        match session.worker.join() {
            Ok(mut fusion) => {
                fusion.reset();
                self.fusion = Some(fusion);
            }
            Err(_) => {
                warn!("el hilo de fusión terminó con pánico, se descarta su estado");
                self.fusion = None;
            }
        }
        info!("motor de postura detenido");
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Modo de la sesión en curso
    pub fn mode(&self) -> Option<EngineMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }
}

impl<P: SensorPlatform + 'static> Drop for PostureEngine<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Todo lo que necesita el hilo de fusión; se mueve entero al hilo
struct FusionWorker {
    fusion: SensorFusion,
    events: Receiver<SensorEvent>,
    stop_rx: Receiver<()>,
    clock: SessionClock,
    cadence: Duration,
    on_frame: FrameCallback,
    stats: Arc<EngineStats>,
}

impl FusionWorker {
    /// Bucle del hilo: eventos de la plataforma, tick de cadencia y parada.
    /// Devuelve el estado para que `stop()` lo reinicie y lo conserve.
    fn run(self) -> SensorFusion {
        let FusionWorker {
            mut fusion,
            mut events,
            stop_rx,
            clock,
            cadence,
            on_frame,
            stats,
        } = self;
        let ticker = tick(cadence);
        let mut events_closed = false;

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        let accepted = fusion.handle_event(&event, clock.now_ms());
                        stats.record_event(accepted);
                    }
                    Err(_) => events_closed = true,
                },
                recv(ticker) -> msg => {
                    let now = msg.map(|at| clock.at(at)).unwrap_or_else(|_| clock.now_ms());
                    if let Some(frame) = fusion.tick(now) {
                        stats.record_frame(fusion.is_idle());
                        on_frame(&frame);
                    }
                }
            }

            // un receptor desconectado estaría siempre listo
            if events_closed {
                debug!("canal de eventos cerrado, solo queda la cadencia");
                events = never();
                events_closed = false;
            }
        }

        fusion
    }
}
