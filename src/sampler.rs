use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::io::BufRead;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{Distance, Millis, RangeFrame, Side};

/// Fuente de lecturas de distancia por sensor
pub trait RangeSampler {
    /// Última distancia del sensor; `Distance::NO_ECHO` si no hay eco
    fn read_distance(&mut self, side: Side) -> Distance;
}

/// Reloj monótono en milisegundos desde su creación
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Estadísticas de recepción de la línea serie
#[derive(Debug, Default)]
pub struct SamplerStats {
    frames: AtomicU32,
    malformed: AtomicU32,
}

impl SamplerStats {
    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u32 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Resultado de decodificar una línea del sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedLine {
    /// `left,right` — el receptor pone la marca de tiempo
    Readings { left: Distance, right: Distance },
    /// `t_ms,left,right`
    Stamped(RangeFrame),
    /// Línea vacía o comentario
    Skip,
}

/// Decodifica una línea `left,right` o `t_ms,left,right`.
/// Devuelve `None` si la línea está mal formada.
pub fn decode_line(line: &str) -> Option<DecodedLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Some(DecodedLine::Skip);
    }

    let fields: Vec<&str> = line.split(',').collect();
    match fields.as_slice() {
        [left, right] => Some(DecodedLine::Readings {
            left: Distance::parse_field(left)?,
            right: Distance::parse_field(right)?,
        }),
        [t_ms, left, right] => {
            let t_ms: Millis = t_ms.trim().parse().ok()?;
            Some(DecodedLine::Stamped(RangeFrame::new(
                t_ms,
                Distance::parse_field(left)?,
                Distance::parse_field(right)?,
            )))
        }
        _ => None,
    }
}

/// Lee líneas del sensor y envía cada frame decodificado por el canal.
///
/// Termina al llegar a EOF o cuando el receptor se cierra. Las líneas mal
/// formadas, incluidas las que no son UTF-8, se cuentan y se descartan.
pub fn start_line_receiver<R: BufRead>(
    mut reader: R,
    clock: MonotonicClock,
    tx: Sender<RangeFrame>,
    stats: Arc<SamplerStats>,
) -> std::io::Result<()> {
    info!("📡 Recibiendo distancias...");

    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(_) => {
                stats.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(line = line_no, raw = ?buf, "línea de sensor no es UTF-8");
                continue;
            }
        };

        let frame = match decode_line(line) {
            Some(DecodedLine::Readings { left, right }) => {
                RangeFrame::new(clock.now_ms(), left, right)
            }
            Some(DecodedLine::Stamped(frame)) => frame,
            Some(DecodedLine::Skip) => continue,
            None => {
                stats.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(line = line_no, raw = %line, "línea de sensor inválida");
                continue;
            }
        };

        stats.frames.fetch_add(1, Ordering::Relaxed);
        if tx.send(frame).is_err() {
            debug!("receptor cerrado, deteniendo lectura");
            return Ok(());
        }
    }

    info!(
        frames = stats.frames(),
        malformed = stats.malformed(),
        "fin de la entrada de sensores"
    );
    Ok(())
}

/// Sampler que conserva el último frame recibido por un canal.
///
/// Cada frame se sella con la hora de recepción del reloj propio; si el
/// último tiene más de `stale_after_ms`, ambos sensores leen sin eco.
pub struct LatestReadings {
    rx: Receiver<RangeFrame>,
    clock: MonotonicClock,
    stale_after_ms: Millis,
    latest: Option<(RangeFrame, Millis)>,
    closed: bool,
}

impl LatestReadings {
    pub fn new(rx: Receiver<RangeFrame>, clock: MonotonicClock, stale_after_ms: Millis) -> Self {
        Self {
            rx,
            clock,
            stale_after_ms,
            latest: None,
            closed: false,
        }
    }

    /// Vacía el canal quedándose con el frame más reciente
    fn drain(&mut self, now: Millis) {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => self.latest = Some((frame, now)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        debug!("canal de lecturas cerrado");
                    }
                    self.closed = true;
                    break;
                }
            }
        }
    }

    /// Lectura de un sensor vista en el instante `now`
    pub fn read_at(&mut self, side: Side, now: Millis) -> Distance {
        self.drain(now);
        match self.latest {
            Some((frame, received)) if now.saturating_sub(received) <= self.stale_after_ms => {
                frame.get(side)
            }
            _ => Distance::NO_ECHO,
        }
    }

    /// `true` cuando el emisor terminó y ya no quedan frames por leer
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RangeSampler for LatestReadings {
    fn read_distance(&mut self, side: Side) -> Distance {
        let now = self.clock.now_ms();
        self.read_at(side, now)
    }
}
