use serde::Serialize;
use std::fmt;

use crate::types::{Distance, Millis, RangeFrame};

/// Informe numerado de ambas distancias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelemetryReport {
    pub seq: u64,
    pub t_ms: Millis,
    pub left: Distance,
    pub right: Distance,
}

impl fmt::Display for TelemetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Left: {} cm  |  Right: {} cm",
            self.seq, self.left, self.right
        )
    }
}

/// Limita los informes de distancia a uno por intervalo
#[derive(Debug, Clone)]
pub struct TelemetryReporter {
    interval_ms: Millis,
    last_report: Option<Millis>,
    seq: u64,
}

impl TelemetryReporter {
    pub fn new(interval_ms: Millis) -> Self {
        Self {
            interval_ms,
            last_report: None,
            seq: 0,
        }
    }

    /// Devuelve un informe si ha pasado el intervalo desde el anterior.
    /// El primer frame siempre se informa.
    pub fn observe(&mut self, frame: &RangeFrame) -> Option<TelemetryReport> {
        if let Some(last) = self.last_report {
            if frame.t_ms.saturating_sub(last) < self.interval_ms {
                return None;
            }
        }

        self.last_report = Some(frame.t_ms);
        self.seq += 1;
        Some(TelemetryReport {
            seq: self.seq,
            t_ms: frame.t_ms,
            left: frame.left,
            right: frame.right,
        })
    }

    pub fn reports(&self) -> u64 {
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(t: Millis, l: Distance, r: Distance) -> RangeFrame {
        RangeFrame::new(t, l, r)
    }

    #[test]
    fn reports_once_per_interval() {
        let mut reporter = TelemetryReporter::new(700);
        let mut seqs = Vec::new();
        for t in (0..=2200).step_by(15) {
            if let Some(report) = reporter.observe(&frame(t, Distance::cm(30), Distance::NO_ECHO)) {
                seqs.push((report.seq, report.t_ms));
            }
        }
        assert_eq!(seqs, vec![(1, 0), (2, 705), (3, 1410), (4, 2115)]);
        assert_eq!(reporter.reports(), 4);
    }

    #[test]
    fn renders_no_echo_as_dashes() {
        let mut reporter = TelemetryReporter::new(700);
        let report = reporter
            .observe(&frame(5, Distance::cm(42), Distance::NO_ECHO))
            .unwrap();
        assert_eq!(report.to_string(), "1: Left: 42 cm  |  Right: --- cm");
    }
}
