//! Reconocimiento de gestos de barrido con dos sensores de distancia.
//!
//! `gesture_classifier` contiene la máquina de estados; el resto son las
//! piezas que la rodean en el daemon: lectura de sensores, telemetría,
//! sinks de eventos, salida HID y trazas CSV.

pub mod config;
pub mod csv_loader;
pub mod gesture_classifier;
pub mod hid;
pub mod sampler;
pub mod sink;
pub mod telemetry;
pub mod types;

pub use gesture_classifier::{ClassifierParams, GestureClassifier, GestureSession, Mode};
pub use types::{Distance, GestureDirection, GestureEvent, Millis, RangeFrame, Side};
