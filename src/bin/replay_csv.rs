use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use posture_sensor::{load_recording, replay_offline, EngineConfig};

struct ReplayOptions {
    json: bool,
    config_path: Option<PathBuf>,
}

const USAGE: &str = "Uso: replay_csv [--json] [--config <config.toml>] <grabacion.csv>";

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut json = false;
    let mut config_path: Option<PathBuf> = None;
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config necesita una ruta"))?;
                config_path = Some(PathBuf::from(path));
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path =
        csv_path.ok_or_else(|| anyhow!("Debes especificar una grabación CSV\n{}", USAGE))?;
    Ok((csv_path, ReplayOptions { json, config_path }))
}

fn flag(value: bool) -> &'static str {
    if value {
        "X"
    } else {
        "."
    }
}

fn main() -> Result<()> {
    let (csv_path, opts) = parse_args()?;

    let config = match &opts.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let events = load_recording(&csv_path)?;
    let frames = replay_offline(&events, &config);

    if opts.json {
        for frame in &frames {
            println!("{}", serde_json::to_string(frame)?);
        }
        return Ok(());
    }

    println!("🎞️  Reproduciendo {:?} ({} eventos)", csv_path, events.len());
    println!(
        "\n{:>14} {:>6} {:>6} {:>7} {:>7} {:>5} {:>5} {:>5} {:>5} {:>5}",
        "ts", "score", "stab", "pitch", "roll", "fwd", "side", "unst", "slch", "conf"
    );
    for frame in &frames {
        println!(
            "{:>14} {:>6.1} {:>6.1} {:>7.1} {:>7.1} {:>5} {:>5} {:>5} {:>5} {:>5.2}",
            frame.ts,
            frame.score,
            frame.stability,
            frame.pitch,
            frame.roll,
            flag(frame.forward_lean),
            flag(frame.side_tilt),
            flag(frame.unstable),
            flag(frame.slouch),
            frame.confidence
        );
    }

    if frames.is_empty() {
        println!("ℹ️  La grabación no produjo frames");
        return Ok(());
    }

    let mean_score = frames.iter().map(|f| f.score).sum::<f64>() / frames.len() as f64;
    let slouching = frames.iter().filter(|f| f.slouch).count();
    println!("\n📊 {} frames, puntuación media {:.1}", frames.len(), mean_score);
    println!(
        "🪑 Slouch en {} frames ({:.1}%)",
        slouching,
        slouching as f64 * 100.0 / frames.len() as f64
    );

    Ok(())
}
