use std::io;
use std::path::PathBuf;

use anyhow::Result;
use barrido::config::DaemonConfig;
use barrido::csv_loader::{load_trace_from_csv, replay_trace};
use barrido::gesture_classifier::GestureClassifier;
use barrido::sink::{EventSink, JsonLinesSink};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "replay_csv", about = "Reproduce una traza CSV en el clasificador")]
struct Cli {
    /// Traza con formato t_ms,left,right
    csv: PathBuf,

    /// Configuración JSON del clasificador
    #[arg(long)]
    config: Option<PathBuf>,

    /// Imprime los gestos como JSON, uno por línea
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barrido=info,replay_csv=info".into()),
        )
        .init();

    let config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };

    info!("🎞️  Reproduciendo traza desde {:?}", cli.csv);
    let frames = load_trace_from_csv(&cli.csv)?;
    let first = frames.first().map(|f| f.t_ms).unwrap_or(0);
    let last = frames.last().map(|f| f.t_ms).unwrap_or(0);
    info!(frames = frames.len(), duration_ms = last - first, "traza cargada");

    let mut classifier = GestureClassifier::new(config.classifier);
    let events = replay_trace(&mut classifier, &frames);

    if cli.json {
        let mut sink = JsonLinesSink::new(io::stdout());
        for event in &events {
            sink.publish_gesture(event);
        }
    } else {
        println!("\n🎯 Gestos detectados: {}", events.len());
        for (idx, event) in events.iter().enumerate() {
            println!(
                "  {:>2}. {:>6} ms  {:<18} (StartSensor: {})",
                idx + 1,
                event.at_ms,
                event.direction.label(),
                event.side
            );
        }
        println!("\nEstado final: {}", classifier.mode().as_str());
    }

    Ok(())
}
