/*
Daemon de gestos de barrido con dos sensores de distancia.

Lee pares de distancias (izquierda, derecha) desde un puerto serie o stdin,
muestrea la última lectura a periodo fijo (tick_interval_ms), la pasa por la
máquina de estados y publica los gestos reconocidos. El tiempo lo pone el
reloj del daemon; para reproducir trazas grabadas usa replay_csv.

Formato de entrada, una línea por lectura:
    40,---
    1200,40,---     (el t_ms se acepta pero se ignora en vivo)

Para ejecutar con el sensor:
    ./target/release/barrido --input /dev/ttyUSB0 --hid

Sin --input arranca el modo DEBUG con teclado (requiere acceso a /dev/input):
    sg input -c './target/debug/barrido'
*/

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use barrido::config::DaemonConfig;
use barrido::csv_loader::{load_trace_from_csv, replay_trace, TraceRecorder};
use barrido::gesture_classifier::GestureClassifier;
use barrido::hid::{GestureAction, HidOutput};
use barrido::sampler::{
    start_line_receiver, LatestReadings, MonotonicClock, RangeSampler, SamplerStats,
};
use barrido::sink::{ChannelSink, EventSink, FanoutSink, JsonLinesSink, LogSink};
use barrido::telemetry::TelemetryReporter;
use barrido::types::{GestureDirection, GestureEvent, RangeFrame, Side};

const STATS_INTERVAL: Duration = Duration::from_secs(5);
const TRACES_DIR: &str = "trazas";

#[derive(Parser, Debug)]
#[command(name = "barrido", about = "Reconocimiento de gestos con dos sensores de distancia")]
struct Cli {
    /// Dispositivo serie con las lecturas ("-" para stdin)
    #[arg(long)]
    input: Option<String>,

    /// Configuración JSON (umbrales, tiempos, intervalo de telemetría)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Graba los frames recibidos en un CSV t_ms,left,right
    #[arg(long)]
    record: Option<PathBuf>,

    /// Publica los gestos como JSON en stdout
    #[arg(long)]
    json: bool,

    /// Envía los gestos como teclas por /dev/uinput
    #[arg(long)]
    hid: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barrido=info".into()),
        )
        .init();

    info!("🎯 barrido v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => DaemonConfig::load(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => DaemonConfig::default(),
    };
    debug!(?config, "configuración activa");

    let mut sink = FanoutSink::new();
    sink.push(LogSink);
    if cli.json {
        sink.push(JsonLinesSink::new(io::stdout()));
    }
    if cli.hid {
        sink.push(ChannelSink::new(spawn_hid_thread()));
    }

    match cli.input.clone() {
        Some(input) => live_mode(&cli, &config, input, sink),
        None => {
            info!("🔧 Modo: DEBUG - Teclado Interactivo");
            debug_mode(&config, sink)
        }
    }
}

/// Lanza el hilo HID y devuelve el canal por el que recibe gestos
fn spawn_hid_thread() -> Sender<GestureEvent> {
    let (tx, rx) = bounded::<GestureEvent>(32);

    std::thread::spawn(move || {
        let mut hid = match HidOutput::new() {
            Ok(h) => {
                info!("✅ HID inicializado (/dev/uinput)");
                h
            }
            Err(e) => {
                error!("❌ No se pudo inicializar HID: {}", e);
                return;
            }
        };

        while let Ok(event) = rx.recv() {
            let action = GestureAction::from(event.direction);
            debug!(?action, "enviando acción HID");
            if let Err(e) = hid.send(action) {
                error!("❌ Error enviando gesto HID {:?}: {}", action, e);
            }
        }
    });

    tx
}

/// Modo normal: lee el sensor en un hilo y clasifica en este
fn live_mode(cli: &Cli, config: &DaemonConfig, input: String, mut sink: FanoutSink) -> Result<()> {
    info!("🔧 Modo: sensor en vivo ({})", input);

    let (tx, rx) = bounded::<RangeFrame>(100);
    let stats = Arc::new(SamplerStats::default());
    let clock = MonotonicClock::new();

    let reader_stats = Arc::clone(&stats);
    std::thread::spawn(move || {
        let result = if input == "-" {
            start_line_receiver(io::stdin().lock(), clock, tx, reader_stats)
        } else {
            File::open(&input)
                .and_then(|file| start_line_receiver(BufReader::new(file), clock, tx, reader_stats))
        };
        if let Err(e) = result {
            error!("❌ Error leyendo sensores: {}", e);
        }
    });

    let mut recorder = match &cli.record {
        Some(path) => Some(TraceRecorder::create(path)?),
        None => None,
    };

    let mut sampler = LatestReadings::new(rx, clock, config.stale_after_ms);
    let mut classifier = GestureClassifier::new(config.classifier);
    let mut reporter = TelemetryReporter::new(config.report_interval_ms);
    let sample_tick = tick(Duration::from_millis(config.tick_interval_ms));
    let stats_tick = tick(STATS_INTERVAL);
    let mut gestures = 0u64;

    info!(
        tick_ms = config.tick_interval_ms,
        "🎬 Esperando barridos izquierda/derecha/arriba/abajo..."
    );

    loop {
        select! {
            recv(sample_tick) -> _ => {
                let left = sampler.read_distance(Side::Left);
                let right = sampler.read_distance(Side::Right);
                let frame = RangeFrame::new(clock.now_ms(), left, right);

                if let Some(report) = reporter.observe(&frame) {
                    sink.publish_telemetry(&report);
                }

                if let Some(rec) = recorder.as_mut() {
                    if let Err(e) = rec.record(&frame) {
                        warn!("❌ Error grabando traza: {}", e);
                    }
                }

                if let Some(event) = classifier.on_frame(&frame) {
                    gestures += 1;
                    sink.publish_gesture(&event);
                }

                if sampler.is_closed() {
                    info!("Entrada de sensores cerrada");
                    break;
                }
            }
            recv(stats_tick) -> _ => {
                debug!(
                    frames = stats.frames(),
                    malformed = stats.malformed(),
                    gestures,
                    mode = classifier.mode().as_str(),
                    "estadísticas"
                );
            }
        }
    }

    if let Some(rec) = recorder {
        let rows = rec.rows();
        rec.finish()?;
        info!(rows, "traza grabada");
    }

    info!(
        frames = stats.frames(),
        malformed = stats.malformed(),
        gestures,
        reports = reporter.reports(),
        "👋 Saliendo"
    );
    Ok(())
}

/// Modo DEBUG: cada tecla reproduce una traza grabada del gesto correspondiente
fn debug_mode(config: &DaemonConfig, mut sink: FanoutSink) -> Result<()> {
    use evdev::{Device, InputEventKind, Key};

    info!("🔍 Buscando teclado...");

    let mut keyboard_device: Option<Device> = None;

    for entry in fs::read_dir("/dev/input")?.flatten() {
        let path = entry.path();
        let is_event = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with("event"))
            .unwrap_or(false);
        if !is_event {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            let is_keyboard = device
                .name()
                .map(|n| {
                    let n = n.to_lowercase();
                    n.contains("keyboard") || n.contains("at translated")
                })
                .unwrap_or(false);
            if is_keyboard {
                info!(
                    "✅ Teclado encontrado: {} ({})",
                    device.name().unwrap_or("?"),
                    path.display()
                );
                keyboard_device = Some(device);
                break;
            }
        }
    }

    let mut device = keyboard_device.ok_or_else(|| {
        anyhow::anyhow!("No se encontró ningún dispositivo de teclado en /dev/input")
    })?;

    println!("Presiona teclas para simular gestos:");
    println!("  r → Left to Right");
    println!("  l → Right to Left");
    println!("  u → Left Sensor UP");
    println!("  d → Left Sensor DOWN");
    println!("  i → Right Sensor UP");
    println!("  o → Right Sensor DOWN");
    println!("  q → salir\n");

    let key_to_direction: HashMap<Key, GestureDirection> = [
        (Key::KEY_R, GestureDirection::HorizontalLeftToRight),
        (Key::KEY_L, GestureDirection::HorizontalRightToLeft),
        (Key::KEY_U, GestureDirection::LeftUp),
        (Key::KEY_D, GestureDirection::LeftDown),
        (Key::KEY_I, GestureDirection::RightUp),
        (Key::KEY_O, GestureDirection::RightDown),
    ]
    .into_iter()
    .collect();

    loop {
        for ev in device.fetch_events()? {
            let InputEventKind::Key(key) = ev.kind() else {
                continue;
            };
            if ev.value() != 1 {
                continue;
            }
            if key == Key::KEY_Q {
                info!("👋 Saliendo...");
                return Ok(());
            }
            let Some(&direction) = key_to_direction.get(&key) else {
                continue;
            };

            let folder = Path::new(TRACES_DIR).join(direction.slug());
            info!("🔑 {} → buscando trazas en {}/", direction, folder.display());

            match replay_random_trace(&folder, config) {
                Ok((file_name, events)) => {
                    info!("📄 Archivo: {}", file_name);
                    if events.is_empty() {
                        warn!("⚠️  La traza no produjo ningún gesto");
                    }
                    for event in &events {
                        if event.direction != direction {
                            warn!("⚠️  Esperado {}, detectado {}", direction, event.direction);
                        }
                        sink.publish_gesture(event);
                    }
                }
                Err(e) => error!("❌ {:#}", e),
            }
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Elige una traza al azar de la carpeta y la pasa por un clasificador nuevo
fn replay_random_trace(folder: &Path, config: &DaemonConfig) -> Result<(String, Vec<GestureEvent>)> {
    use rand::seq::SliceRandom;

    let csv_files: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("Carpeta no existe: {}", folder.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    let csv_path = csv_files
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| anyhow::anyhow!("No hay archivos CSV en {}", folder.display()))?;
    let file_name = csv_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.csv")
        .to_string();

    let frames = load_trace_from_csv(csv_path)?;
    let mut classifier = GestureClassifier::new(config.classifier);
    Ok((file_name, replay_trace(&mut classifier, &frames)))
}
