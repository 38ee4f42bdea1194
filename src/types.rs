use serde::Serialize;
use std::fmt;

/// Milisegundos de un reloj monótono
pub type Millis = u64;

/// Valor reservado por el driver cuando no vuelve eco
pub const NO_ECHO_CM: i32 = 999;

/// Texto con el que se representa "sin eco" en telemetría y trazas
pub const NO_ECHO_TEXT: &str = "---";

/// Topics MQTT del firmware del sensor
pub const TOPIC_DIRECTION: &str = "Direction";
pub const TOPIC_START_SENSOR: &str = "StartSensor";
pub const TOPIC_SENSOR_LEFT: &str = "sensor/left";
pub const TOPIC_SENSOR_RIGHT: &str = "sensor/right";

/// Lado físico del sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Valor publicado en `StartSensor`
    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lectura de distancia en centímetros.
///
/// `Distance::NO_ECHO` es mucho mayor que cualquier rango de detección, así que
/// falla de forma natural las comparaciones de rango sin tratarse aparte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Distance(i32);

impl Distance {
    pub const NO_ECHO: Distance = Distance(NO_ECHO_CM);

    /// Valores negativos se tratan como 0; los que llegan a `NO_ECHO_CM`
    /// o lo superan se tratan como sin eco
    pub const fn cm(value: i32) -> Self {
        if value >= NO_ECHO_CM {
            Distance::NO_ECHO
        } else if value < 0 {
            Distance(0)
        } else {
            Distance(value)
        }
    }

    pub const fn as_cm(self) -> i32 {
        self.0
    }

    pub fn is_no_echo(self) -> bool {
        self.0 == NO_ECHO_CM
    }

    /// `true` si la lectura cae en `(0, max]`
    pub fn within(self, max: i32) -> bool {
        self.0 > 0 && self.0 <= max
    }

    /// `true` si el objeto salió de la zona de detección
    pub fn beyond(self, max: i32) -> bool {
        self.0 > max
    }

    /// Interpreta un campo de texto: entero, `---`, `999` o vacío.
    /// Lecturas por encima de `NO_ECHO_CM` cuentan como sin eco.
    pub fn parse_field(field: &str) -> Option<Self> {
        let field = field.trim();
        if field.is_empty() || field == NO_ECHO_TEXT {
            return Some(Distance::NO_ECHO);
        }
        field.parse::<i32>().ok().filter(|v| *v >= 0).map(Distance::cm)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_echo() {
            f.write_str(NO_ECHO_TEXT)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Un tick de entrada: ambas lecturas y su marca de tiempo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFrame {
    pub t_ms: Millis,
    pub left: Distance,
    pub right: Distance,
}

impl RangeFrame {
    pub fn new(t_ms: Millis, left: Distance, right: Distance) -> Self {
        Self { t_ms, left, right }
    }

    pub fn get(&self, side: Side) -> Distance {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Los seis gestos reconocibles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GestureDirection {
    HorizontalLeftToRight,
    HorizontalRightToLeft,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
}

impl GestureDirection {
    pub const ALL: [GestureDirection; 6] = [
        GestureDirection::HorizontalLeftToRight,
        GestureDirection::HorizontalRightToLeft,
        GestureDirection::LeftDown,
        GestureDirection::LeftUp,
        GestureDirection::RightDown,
        GestureDirection::RightUp,
    ];

    pub fn horizontal(from: Side) -> Self {
        match from {
            Side::Left => GestureDirection::HorizontalLeftToRight,
            Side::Right => GestureDirection::HorizontalRightToLeft,
        }
    }

    pub fn down(side: Side) -> Self {
        match side {
            Side::Left => GestureDirection::LeftDown,
            Side::Right => GestureDirection::RightDown,
        }
    }

    pub fn up(side: Side) -> Self {
        match side {
            Side::Left => GestureDirection::LeftUp,
            Side::Right => GestureDirection::RightUp,
        }
    }

    /// Sensor que inició el gesto
    pub fn side(self) -> Side {
        match self {
            GestureDirection::HorizontalLeftToRight
            | GestureDirection::LeftDown
            | GestureDirection::LeftUp => Side::Left,
            GestureDirection::HorizontalRightToLeft
            | GestureDirection::RightDown
            | GestureDirection::RightUp => Side::Right,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(
            self,
            GestureDirection::HorizontalLeftToRight | GestureDirection::HorizontalRightToLeft
        )
    }

    /// Valor publicado en `Direction`
    pub fn label(self) -> &'static str {
        match self {
            GestureDirection::HorizontalLeftToRight => "Left to Right",
            GestureDirection::HorizontalRightToLeft => "Right to Left",
            GestureDirection::LeftDown => "Left Sensor DOWN",
            GestureDirection::LeftUp => "Left Sensor UP",
            GestureDirection::RightDown => "Right Sensor DOWN",
            GestureDirection::RightUp => "Right Sensor UP",
        }
    }

    /// Nombre de carpeta usado para las trazas grabadas
    pub fn slug(self) -> &'static str {
        match self {
            GestureDirection::HorizontalLeftToRight => "izquierda-derecha",
            GestureDirection::HorizontalRightToLeft => "derecha-izquierda",
            GestureDirection::LeftDown => "izquierda-abajo",
            GestureDirection::LeftUp => "izquierda-arriba",
            GestureDirection::RightDown => "derecha-abajo",
            GestureDirection::RightUp => "derecha-arriba",
        }
    }
}

impl fmt::Display for GestureDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evento emitido por el clasificador, uno por gesto reconocido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GestureEvent {
    pub direction: GestureDirection,
    pub side: Side,
    pub at_ms: Millis,
}

impl GestureEvent {
    /// El lado se deriva de la dirección para que nunca discrepen
    pub fn new(direction: GestureDirection, at_ms: Millis) -> Self {
        Self {
            direction,
            side: direction.side(),
            at_ms,
        }
    }
}
