use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

use crate::telemetry::TelemetryReport;
use crate::types::{
    GestureDirection, GestureEvent, Millis, TOPIC_DIRECTION, TOPIC_SENSOR_LEFT, TOPIC_SENSOR_RIGHT,
    TOPIC_START_SENSOR,
};

/// Destino de los gestos y de la telemetría.
///
/// Un sink nunca devuelve errores al bucle principal: los fallos se registran
/// y el evento se descarta.
pub trait EventSink {
    fn publish_gesture(&mut self, event: &GestureEvent);

    fn publish_telemetry(&mut self, _report: &TelemetryReport) {}
}

/// Mensaje de gesto con las claves de los topics MQTT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GestureMessage {
    #[serde(rename = "Direction")]
    pub direction: &'static str,
    #[serde(rename = "StartSensor")]
    pub start_sensor: &'static str,
    pub at_ms: Millis,
}

impl From<&GestureEvent> for GestureMessage {
    fn from(event: &GestureEvent) -> Self {
        Self {
            direction: event.direction.label(),
            start_sensor: event.side.label(),
            at_ms: event.at_ms,
        }
    }
}

/// Registra gestos y telemetría con `tracing`
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish_gesture(&mut self, event: &GestureEvent) {
        let symbol = match event.direction {
            GestureDirection::HorizontalLeftToRight => ">>>",
            GestureDirection::HorizontalRightToLeft => "<<<",
            GestureDirection::LeftDown | GestureDirection::RightDown => "vvv",
            GestureDirection::LeftUp | GestureDirection::RightUp => "^^^",
        };
        let kind = if event.direction.is_horizontal() {
            "HORIZONTAL"
        } else {
            "VERTICAL"
        };
        info!(
            topic_direction = TOPIC_DIRECTION,
            topic_start = TOPIC_START_SENSOR,
            start_sensor = event.side.label(),
            at_ms = event.at_ms,
            "{} {} SWIPE: {} {}",
            symbol,
            kind,
            event.direction,
            symbol
        );
    }

    fn publish_telemetry(&mut self, report: &TelemetryReport) {
        info!(
            topic_left = TOPIC_SENSOR_LEFT,
            topic_right = TOPIC_SENSOR_RIGHT,
            "{}",
            report
        );
    }
}

/// Reenvía gestos a otro hilo. Si el receptor desaparece o el canal está
/// lleno, el gesto se descarta sin bloquear al clasificador.
pub struct ChannelSink {
    tx: Sender<GestureEvent>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<GestureEvent>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn publish_gesture(&mut self, event: &GestureEvent) {
        match self.tx.try_send(*event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!(direction = %event.direction, "canal de gestos lleno, descartado");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                warn!(direction = %event.direction, "canal de gestos cerrado, descartado");
            }
        }
    }
}

/// Escribe un objeto JSON por gesto
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn publish_gesture(&mut self, event: &GestureEvent) {
        if let Err(e) = self.write_line(&GestureMessage::from(event)) {
            warn!("❌ Error escribiendo gesto JSON: {}", e);
        }
    }
}

/// Reparte cada evento entre varios sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink + Send>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl EventSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }
}

impl EventSink for FanoutSink {
    fn publish_gesture(&mut self, event: &GestureEvent) {
        for sink in &mut self.sinks {
            sink.publish_gesture(event);
        }
    }

    fn publish_telemetry(&mut self, report: &TelemetryReport) {
        for sink in &mut self.sinks {
            sink.publish_telemetry(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn json_lines_use_wire_keys() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish_gesture(&GestureEvent::new(GestureDirection::LeftDown, 1400));
        sink.publish_gesture(&GestureEvent::new(
            GestureDirection::HorizontalRightToLeft,
            3000,
        ));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"Direction":"Left Sensor DOWN","StartSensor":"Left","at_ms":1400}"#,
                r#"{"Direction":"Right to Left","StartSensor":"Right","at_ms":3000}"#,
            ]
        );
    }

    #[test]
    fn channel_sink_drops_without_blocking() {
        let (tx, rx) = bounded(1);
        let mut sink = ChannelSink::new(tx);
        let event = GestureEvent::new(GestureDirection::RightUp, 10);

        sink.publish_gesture(&event);
        sink.publish_gesture(&event);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap(), event);

        drop(rx);
        sink.publish_gesture(&event);
        assert_eq!(sink.dropped(), 2);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let (tx_a, rx_a) = bounded(4);
        let (tx_b, rx_b) = bounded(4);
        let mut fanout = FanoutSink::new();
        fanout.push(ChannelSink::new(tx_a));
        fanout.push(ChannelSink::new(tx_b));
        fanout.push(LogSink);

        let event = GestureEvent::new(GestureDirection::HorizontalLeftToRight, 5);
        fanout.publish_gesture(&event);
        assert_eq!(rx_a.try_recv().unwrap(), event);
        assert_eq!(rx_b.try_recv().unwrap(), event);
    }
}
