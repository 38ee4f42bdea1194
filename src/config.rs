use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::gesture_classifier::ClassifierParams;
use crate::types::{Millis, NO_ECHO_CM};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{name} debe ser positivo (valor: {value})")]
    NotPositive { name: &'static str, value: i64 },

    #[error("max_detect_dist ({0} cm) debe quedar por debajo del valor sin eco (999 cm)")]
    RangeOverlapsNoEcho(i32),

    #[error("{name} ({value} cm) debe quedar por debajo del valor sin eco (999 cm)")]
    BeyondNoEcho { name: &'static str, value: i32 },

    #[error("{shorter} ({shorter_ms} ms) no puede superar {longer} ({longer_ms} ms)")]
    InvertedWindow {
        shorter: &'static str,
        shorter_ms: Millis,
        longer: &'static str,
        longer_ms: Millis,
    },
}

/// Configuración completa del daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub classifier: ClassifierParams,
    /// Periodo del informe de distancias (default: 700 ms)
    pub report_interval_ms: Millis,
    /// Periodo del bucle de muestreo (default: 20 ms)
    pub tick_interval_ms: Millis,
    /// Una lectura más vieja que esto cuenta como sin eco (default: 250 ms)
    pub stale_after_ms: Millis,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierParams::default(),
            report_interval_ms: 700,
            tick_interval_ms: 20,
            stale_after_ms: 250,
        }
    }
}

impl DaemonConfig {
    /// Carga la configuración desde JSON; los campos ausentes toman su default
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("report_interval_ms", self.report_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("stale_after_ms", self.stale_after_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive { name, value: 0 });
            }
        }
        self.classifier.validate()
    }
}

impl ClassifierParams {
    /// Rechaza ajustes incoherentes antes de construir el clasificador
    pub fn validate(&self) -> Result<(), ConfigError> {
        let distances = [
            ("max_detect_dist", self.max_detect_dist),
            ("high_thresh", self.high_thresh),
            ("low_thresh", self.low_thresh),
            ("horizontal_tolerance", self.horizontal_tolerance),
        ];
        for (name, value) in distances {
            if value <= 0 {
                return Err(ConfigError::NotPositive {
                    name,
                    value: value as i64,
                });
            }
        }

        if self.max_detect_dist >= NO_ECHO_CM {
            return Err(ConfigError::RangeOverlapsNoEcho(self.max_detect_dist));
        }
        for &(name, value) in &distances[1..] {
            if value >= NO_ECHO_CM {
                return Err(ConfigError::BeyondNoEcho { name, value });
            }
        }

        if self.max_swipe_time == 0 {
            return Err(ConfigError::NotPositive {
                name: "max_swipe_time",
                value: 0,
            });
        }

        for (shorter, shorter_ms) in [
            ("min_swipe_time", self.min_swipe_time),
            ("settle_time", self.settle_time),
        ] {
            if shorter_ms > self.max_swipe_time {
                return Err(ConfigError::InvertedWindow {
                    shorter,
                    shorter_ms,
                    longer: "max_swipe_time",
                    longer_ms: self.max_swipe_time,
                });
            }
        }

        Ok(())
    }
}
