use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{ReaderBuilder, Writer};

use crate::gesture_classifier::GestureClassifier;
use crate::types::{Distance, GestureEvent, Millis, RangeFrame};

const HEADER: [&str; 3] = ["t_ms", "left", "right"];

/// Carga una traza de ticks desde un CSV con formato t_ms,left,right.
/// "Sin eco" puede venir como `---`, `999` o un campo vacío.
pub fn load_trace_from_csv(path: impl AsRef<Path>) -> Result<Vec<RangeFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: Vec<RangeFrame> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Fila {} inválida en {:?}", row, path))?;
        if record.len() < 3 {
            bail!("La fila {} no tiene 3 columnas", row);
        }

        let t_ms: Millis = record[0]
            .parse()
            .with_context(|| format!("t_ms inválido en fila {}", row))?;
        let left = Distance::parse_field(&record[1])
            .ok_or_else(|| anyhow!("left inválido en fila {}: {:?}", row, &record[1]))?;
        let right = Distance::parse_field(&record[2])
            .ok_or_else(|| anyhow!("right inválido en fila {}: {:?}", row, &record[2]))?;

        if let Some(prev) = frames.last() {
            ensure!(
                t_ms >= prev.t_ms,
                "La marca de tiempo retrocede en fila {} ({} < {})",
                row,
                t_ms,
                prev.t_ms
            );
        }

        frames.push(RangeFrame::new(t_ms, left, right));
    }

    if frames.is_empty() {
        return Err(anyhow!("El CSV {:?} no contiene datos", path));
    }

    Ok(frames)
}

/// Escribe una traza completa en CSV
pub fn write_trace_to_csv(path: impl AsRef<Path>, frames: &[RangeFrame]) -> Result<()> {
    let mut recorder = TraceRecorder::create(path)?;
    for frame in frames {
        recorder.record(frame)?;
    }
    recorder.finish()
}

/// Graba frames en CSV a medida que llegan
pub struct TraceRecorder {
    writer: Writer<File>,
    rows: usize,
}

impl TraceRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("No se pudo crear el CSV {:?}", path))?;
        writer.write_record(HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn record(&mut self, frame: &RangeFrame) -> Result<()> {
        self.writer.write_record([
            frame.t_ms.to_string(),
            frame.left.to_string(),
            frame.right.to_string(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Alimenta un clasificador con una traza y devuelve los gestos emitidos
pub fn replay_trace(classifier: &mut GestureClassifier, frames: &[RangeFrame]) -> Vec<GestureEvent> {
    frames
        .iter()
        .filter_map(|frame| classifier.on_frame(frame))
        .collect()
}
