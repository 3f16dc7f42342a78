/*
Señal de postura a partir de los sensores del dispositivo

Ejecuta el motor en vivo durante unos segundos e imprime cada frame:
1. Con una grabación CSV (ts_ms,kind,a,b,c) la reproduce en tiempo real como
   si fuese un teléfono con sensores y permiso concedido
2. Sin grabación usa una plataforma sin sensores (señal sintética)

Ejemplos:
    ./target/release/posture-sensor --seconds 5 sesion.csv
    RUST_LOG=debug ./target/release/posture-sensor --config posture.toml
*/

use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

use posture_sensor::{
    load_recording, EngineConfig, HeadlessPlatform, PostureEngine, PostureFrame, ReplayPlatform,
    SensorPlatform,
};

const DEFAULT_SECONDS: u64 = 10;
const USAGE: &str = "Uso: posture-sensor [--config <config.toml>] [--seconds N] [grabacion.csv]";

struct RunOptions {
    config_path: Option<PathBuf>,
    seconds: u64,
    recording: Option<PathBuf>,
}

fn parse_args() -> Result<RunOptions> {
    let mut opts = RunOptions {
        config_path: None,
        seconds: DEFAULT_SECONDS,
        recording: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config necesita una ruta"))?;
                opts.config_path = Some(PathBuf::from(path));
            }
            "--seconds" => {
                let value = args.next().ok_or_else(|| anyhow!("--seconds necesita un valor"))?;
                opts.seconds = value
                    .parse()
                    .with_context(|| format!("--seconds inválido: {}", value))?;
            }
            "-h" | "--help" => bail!(USAGE),
            _ => {
                if opts.recording.is_some() {
                    bail!(USAGE);
                }
                opts.recording = Some(PathBuf::from(arg));
            }
        }
    }

    Ok(opts)
}

fn print_frame(frame: &PostureFrame) {
    let mut faults = Vec::new();
    if frame.forward_lean {
        faults.push("adelante");
    }
    if frame.side_tilt {
        faults.push("lateral");
    }
    if frame.unstable {
        faults.push("inestable");
    }
    if frame.slouch {
        faults.push("SLOUCH");
    }

    let icon = if frame.confidence <= 0.25 {
        "💤"
    } else if faults.is_empty() {
        "✅"
    } else {
        "⚠️ "
    };
    println!(
        "{} [{}] score={:>5.1} estab={:>5.1} pitch={:>6.1}° roll={:>6.1}° deriva={:>5.1}° conf={:.2} {}",
        icon,
        frame.iso_timestamp,
        frame.score,
        frame.stability,
        frame.pitch,
        frame.roll,
        frame.yaw_drift,
        frame.confidence,
        faults.join(",")
    );
}

fn run<P: SensorPlatform + 'static>(platform: P, config: EngineConfig, seconds: u64) -> Result<()> {
    let mut engine = PostureEngine::new(platform, config)?
        .on_frame(print_frame)
        .on_error(|message| eprintln!("❌ {}", message));

    let mode = engine.start()?;
    println!("🎬 Motor en modo {:?} durante {} s\n", mode, seconds);

    thread::sleep(Duration::from_secs(seconds));
    engine.stop();

    let stats = engine.stats();
    println!(
        "\n📊 eventos={} muestras={} frames={} sintéticos={}",
        stats.events_received, stats.samples_accepted, stats.frames_emitted, stats.synthetic_frames
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🧍 Posture Sensor - fusión de orientación y movimiento\n");
    let opts = parse_args()?;

    let config = match &opts.config_path {
        Some(path) => {
            println!("🔧 Configuración: {:?}", path);
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };

    match &opts.recording {
        Some(path) => {
            let events = load_recording(path)?;
            println!("📄 Grabación {:?} ({} eventos)", path, events.len());
            run(ReplayPlatform::phone(events), config, opts.seconds)
        }
        None => {
            println!("🔌 Sin grabación: plataforma sin sensores");
            run(HeadlessPlatform, config, opts.seconds)
        }
    }
}
