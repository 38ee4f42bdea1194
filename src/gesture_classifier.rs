use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{Distance, GestureDirection, GestureEvent, Millis, RangeFrame, Side};

/// Parámetros de ajuste del clasificador
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Distancia máxima para considerar un objeto presente (default: 85 cm)
    pub max_detect_dist: i32,
    /// Desplazamiento vertical requerido (default: 15 cm)
    pub high_thresh: i32,
    /// Distancia mínima al sensor para un gesto hacia arriba (default: 5 cm)
    pub low_thresh: i32,
    /// Tiempo mínimo desde el disparo para aceptar barridos (default: 300 ms)
    pub min_swipe_time: Millis,
    /// Tiempo máximo de un intento de gesto (default: 700 ms)
    pub max_swipe_time: Millis,
    /// Anti-rebote tras emitir un gesto (default: 1000 ms)
    pub cooldown_time: Millis,
    /// Espera tras el disparo antes de evaluar el sensor opuesto (default: 350 ms)
    pub settle_time: Millis,
    /// Margen de altura para un barrido horizontal (default: ±10 cm)
    pub horizontal_tolerance: i32,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            max_detect_dist: 85,
            high_thresh: 15,
            low_thresh: 5,
            min_swipe_time: 300,
            max_swipe_time: 700,
            cooldown_time: 1000,
            settle_time: 350,
            horizontal_tolerance: 10,
        }
    }
}

/// Gesto en curso. Solo existe mientras el clasificador está disparado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSession {
    pub side: Side,
    pub start_distance: Distance,
    pub trigger_time: Millis,
}

impl GestureSession {
    fn elapsed(&self, now: Millis) -> Millis {
        now.saturating_sub(self.trigger_time)
    }
}

/// Modo observable del clasificador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    LeftTriggered,
    RightTriggered,
    Cooldown,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::LeftTriggered => "L_TRIGGERED",
            Mode::RightTriggered => "R_TRIGGERED",
            Mode::Cooldown => "COOLDOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Triggered(GestureSession),
    Cooldown { since: Millis },
}

/// Máquina de estados que convierte lecturas de dos sensores en gestos.
///
/// Se llama una vez por tick con las dos distancias y la marca de tiempo
/// actual; devuelve como mucho un evento por llamada.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    params: ClassifierParams,
    state: State,
}

impl GestureClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            state: State::Idle,
        }
    }

    /// Avanza la máquina exactamente un paso
    pub fn on_tick(&mut self, left: Distance, right: Distance, now: Millis) -> Option<GestureEvent> {
        let frame = RangeFrame::new(now, left, right);

        if let State::Cooldown { since } = self.state {
            let cooled = now.saturating_sub(since) > self.params.cooldown_time;
            let clear = left.beyond(self.params.max_detect_dist)
                && right.beyond(self.params.max_detect_dist);
            if cooled && clear {
                debug!(now, "cooldown terminado");
                self.state = State::Idle;
            }
            return None;
        }

        if let State::Triggered(session) = self.state {
            if session.elapsed(now) > self.params.max_swipe_time {
                debug!(side = %session.side, now, "intento de gesto caducado");
                self.state = State::Idle;
            }
        }

        // Tras caducar se vuelve a evaluar Idle en el mismo tick
        match self.state {
            State::Idle => {
                self.arm(&frame);
                None
            }
            State::Triggered(session) => self.evaluate(session, &frame),
            State::Cooldown { .. } => None,
        }
    }

    pub fn on_frame(&mut self, frame: &RangeFrame) -> Option<GestureEvent> {
        self.on_tick(frame.left, frame.right, frame.t_ms)
    }

    fn arm(&mut self, frame: &RangeFrame) {
        // El sensor izquierdo tiene prioridad ante disparos simultáneos
        let side = if frame.left.within(self.params.max_detect_dist) {
            Side::Left
        } else if frame.right.within(self.params.max_detect_dist) {
            Side::Right
        } else {
            return;
        };

        let session = GestureSession {
            side,
            start_distance: frame.get(side),
            trigger_time: frame.t_ms,
        };
        debug!(
            side = %side,
            start = session.start_distance.as_cm(),
            now = frame.t_ms,
            "sensor disparado"
        );
        self.state = State::Triggered(session);
    }

    fn evaluate(&mut self, session: GestureSession, frame: &RangeFrame) -> Option<GestureEvent> {
        let p = self.params;
        let elapsed = session.elapsed(frame.t_ms);

        if elapsed < p.settle_time {
            trace!(elapsed, "esperando a que el sensor opuesto se estabilice");
            return None;
        }

        let start = session.start_distance.as_cm();
        let other = frame.get(session.side.opposite());
        let own = frame.get(session.side);

        let same_height = other.within(p.max_detect_dist)
            && start.abs_diff(other.as_cm()) <= p.horizontal_tolerance.max(0) as u32;

        if same_height {
            // La coincidencia horizontal bloquea las pruebas verticales aunque
            // todavía no se cumpla el tiempo mínimo
            if elapsed >= p.min_swipe_time {
                return Some(self.emit(GestureDirection::horizontal(session.side), frame.t_ms));
            }
            return None;
        }

        let d = own.as_cm();
        // Bajar no exige tiempo mínimo; subir sí
        if start >= p.high_thresh && start - d >= p.high_thresh {
            return Some(self.emit(GestureDirection::down(session.side), frame.t_ms));
        }
        if start >= p.low_thresh
            && d - start >= p.high_thresh
            && !own.is_no_echo()
            && elapsed >= p.min_swipe_time
        {
            return Some(self.emit(GestureDirection::up(session.side), frame.t_ms));
        }

        None
    }

    fn emit(&mut self, direction: GestureDirection, now: Millis) -> GestureEvent {
        debug!(direction = %direction, now, "gesto reconocido, entrando en cooldown");
        self.state = State::Cooldown { since: now };
        GestureEvent::new(direction, now)
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            State::Idle => Mode::Idle,
            State::Triggered(GestureSession {
                side: Side::Left, ..
            }) => Mode::LeftTriggered,
            State::Triggered(GestureSession {
                side: Side::Right, ..
            }) => Mode::RightTriggered,
            State::Cooldown { .. } => Mode::Cooldown,
        }
    }

    /// Gesto en curso, si lo hay
    pub fn session(&self) -> Option<&GestureSession> {
        match &self.state {
            State::Triggered(session) => Some(session),
            _ => None,
        }
    }

    /// Inicio del cooldown activo, si lo hay
    pub fn cooldown_since(&self) -> Option<Millis> {
        match self.state {
            State::Cooldown { since } => Some(since),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ClassifierParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAR: Distance = Distance::NO_ECHO;

    fn cm(v: i32) -> Distance {
        Distance::cm(v)
    }

    /// Clasificador ya disparado por el lado izquierdo en t=1000
    fn left_triggered(start: i32) -> GestureClassifier {
        let mut c = GestureClassifier::default();
        assert_eq!(c.on_tick(cm(start), FAR, 1000), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        c
    }

    fn right_triggered(start: i32) -> GestureClassifier {
        let mut c = GestureClassifier::default();
        assert_eq!(c.on_tick(FAR, cm(start), 1000), None);
        assert_eq!(c.mode(), Mode::RightTriggered);
        c
    }

    #[test]
    fn test_idle_to_left_triggered() {
        let mut c = GestureClassifier::default();
        assert_eq!(c.mode(), Mode::Idle);
        assert_eq!(c.on_tick(cm(40), cm(70), 0), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        let session = c.session().unwrap();
        assert_eq!(session.side, Side::Left);
        assert_eq!(session.start_distance, cm(40));
        assert_eq!(session.trigger_time, 0);
    }

    #[test]
    fn test_left_wins_simultaneous_trigger() {
        let mut c = GestureClassifier::default();
        c.on_tick(cm(60), cm(30), 5);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        assert_eq!(c.session().unwrap().start_distance, cm(60));
    }

    #[test]
    fn test_idle_right_trigger_and_out_of_range() {
        let mut c = GestureClassifier::default();
        c.on_tick(cm(86), FAR, 0);
        c.on_tick(cm(0), FAR, 10);
        assert_eq!(c.mode(), Mode::Idle);
        c.on_tick(FAR, cm(85), 20);
        assert_eq!(c.mode(), Mode::RightTriggered);
        assert!(c.session().is_some());
    }

    #[test]
    fn test_horizontal_left_to_right() {
        let mut c = left_triggered(40);
        assert_eq!(c.on_tick(cm(40), FAR, 1340), None);
        let event = c.on_tick(FAR, cm(42), 1400).expect("gesto horizontal");
        assert_eq!(event.direction, GestureDirection::HorizontalLeftToRight);
        assert_eq!(event.side, Side::Left);
        assert_eq!(event.at_ms, 1400);
        assert_eq!(c.mode(), Mode::Cooldown);
        assert_eq!(c.cooldown_since(), Some(1400));
        assert!(c.session().is_none());
    }

    #[test]
    fn test_horizontal_right_to_left() {
        let mut c = right_triggered(30);
        let event = c.on_tick(cm(21), FAR, 1360).expect("gesto horizontal");
        assert_eq!(event.direction, GestureDirection::HorizontalRightToLeft);
        assert_eq!(event.side, Side::Right);
    }

    #[test]
    fn test_horizontal_outside_tolerance_is_ignored() {
        let mut c = left_triggered(40);
        // 40 + 11 fuera del margen; el propio lado sin cambios
        assert_eq!(c.on_tick(cm(40), cm(51), 1400), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
    }

    #[test]
    fn test_huge_tolerance_does_not_overflow() {
        let params = ClassifierParams {
            horizontal_tolerance: i32::MAX,
            ..ClassifierParams::default()
        };
        let mut c = GestureClassifier::new(params);
        c.on_tick(cm(40), FAR, 1000);
        let event = c.on_tick(cm(40), cm(80), 1400).expect("gesto horizontal");
        assert_eq!(event.direction, GestureDirection::HorizontalLeftToRight);
    }

    #[test]
    fn test_horizontal_match_skips_vertical_before_min_time() {
        let params = ClassifierParams {
            settle_time: 200,
            ..ClassifierParams::default()
        };
        let mut c = GestureClassifier::new(params);
        c.on_tick(cm(40), FAR, 1000);
        // El propio lado bajó 20 cm, pero el opuesto coincide en altura
        assert_eq!(c.on_tick(cm(20), cm(42), 1250), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        let event = c.on_tick(cm(20), cm(42), 1300).expect("gesto horizontal");
        assert_eq!(event.direction, GestureDirection::HorizontalLeftToRight);
    }

    #[test]
    fn test_settling_delay_blocks_evaluation() {
        let mut c = left_triggered(40);
        // Sensor opuesto coincide y el propio baja, pero aún no pasan 350 ms
        assert_eq!(c.on_tick(cm(10), cm(40), 1349), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        let event = c.on_tick(FAR, cm(40), 1350).expect("gesto tras estabilizar");
        assert_eq!(event.direction, GestureDirection::HorizontalLeftToRight);
    }

    #[test]
    fn test_left_down_without_min_time_gate() {
        let params = ClassifierParams {
            min_swipe_time: 600,
            ..ClassifierParams::default()
        };
        let mut c = GestureClassifier::new(params);
        c.on_tick(cm(40), FAR, 1000);
        let event = c.on_tick(cm(20), FAR, 1350).expect("gesto hacia abajo");
        assert_eq!(event.direction, GestureDirection::LeftDown);
        assert_eq!(event.side, Side::Left);
        assert_eq!(c.mode(), Mode::Cooldown);
    }

    #[test]
    fn test_down_requires_start_above_threshold() {
        let mut c = left_triggered(14);
        assert_eq!(c.on_tick(cm(0), FAR, 1400), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
    }

    #[test]
    fn test_left_up_waits_for_min_swipe_time() {
        let params = ClassifierParams {
            settle_time: 200,
            ..ClassifierParams::default()
        };
        let mut c = GestureClassifier::new(params);
        c.on_tick(cm(10), FAR, 1000);
        assert_eq!(c.on_tick(cm(30), FAR, 1250), None);
        assert_eq!(c.mode(), Mode::LeftTriggered);
        let event = c.on_tick(cm(30), FAR, 1300).expect("gesto hacia arriba");
        assert_eq!(event.direction, GestureDirection::LeftUp);
    }

    #[test]
    fn test_left_up_with_default_timings() {
        let mut c = left_triggered(10);
        assert_eq!(c.on_tick(cm(30), FAR, 1320), None);
        let event = c.on_tick(cm(30), FAR, 1360).expect("gesto hacia arriba");
        assert_eq!(event.direction, GestureDirection::LeftUp);
        assert_eq!(c.mode(), Mode::Cooldown);
    }

    #[test]
    fn test_right_up_and_down() {
        let mut c = right_triggered(50);
        let event = c.on_tick(FAR, cm(30), 1400).unwrap();
        assert_eq!(event.direction, GestureDirection::RightDown);

        let mut c = right_triggered(20);
        let event = c.on_tick(FAR, cm(40), 1400).unwrap();
        assert_eq!(event.direction, GestureDirection::RightUp);
    }

    #[test]
    fn test_no_echo_never_counts_as_up() {
        for start in [5, 10, 40, 85] {
            let mut c = left_triggered(start);
            for t in (1350..=1700).step_by(25) {
                assert_eq!(c.on_tick(FAR, FAR, t), None, "start={}", start);
            }
        }
    }

    #[test]
    fn test_reading_past_no_echo_is_not_up() {
        let mut c = left_triggered(10);
        let far = Distance::parse_field("1500").unwrap();
        for t in (1350..=1700).step_by(25) {
            assert_eq!(c.on_tick(far, FAR, t), None);
        }
        assert_eq!(c.on_tick(Distance::cm(1500), FAR, 1700), None);
    }

    #[test]
    fn test_timeout_returns_to_idle_silently() {
        let mut c = left_triggered(40);
        for t in (1350..=1700).step_by(50) {
            assert_eq!(c.on_tick(cm(40), FAR, t), None);
            assert_eq!(c.mode(), Mode::LeftTriggered);
        }
        assert_eq!(c.on_tick(FAR, FAR, 1701), None);
        assert_eq!(c.mode(), Mode::Idle);
    }

    #[test]
    fn test_timeout_rearms_in_same_tick() {
        let mut c = left_triggered(40);
        assert_eq!(c.on_tick(FAR, cm(60), 1701), None);
        assert_eq!(c.mode(), Mode::RightTriggered);
        let session = c.session().unwrap();
        assert_eq!(session.start_distance, cm(60));
        assert_eq!(session.trigger_time, 1701);
    }

    #[test]
    fn test_cooldown_ignores_input() {
        let mut c = left_triggered(40);
        c.on_tick(cm(20), FAR, 1400).unwrap();
        // Lecturas que dispararían cualquier rama; el modo no cambia
        for t in (1400..=3000).step_by(20) {
            assert_eq!(c.on_tick(cm(10), cm(12), t), None);
            assert_eq!(c.mode(), Mode::Cooldown);
            assert_eq!(c.cooldown_since(), Some(1400));
        }
    }

    #[test]
    fn test_cooldown_exit_needs_time_and_clear_zone() {
        let mut c = left_triggered(40);
        c.on_tick(cm(20), FAR, 1400).unwrap();

        // Zona despejada pero sin tiempo suficiente
        assert_eq!(c.on_tick(FAR, FAR, 2400), None);
        assert_eq!(c.mode(), Mode::Cooldown);

        // Tiempo cumplido pero la mano sigue en un lado
        assert_eq!(c.on_tick(FAR, cm(85), 2401), None);
        assert_eq!(c.mode(), Mode::Cooldown);

        assert_eq!(c.on_tick(cm(86), FAR, 2402), None);
        assert_eq!(c.mode(), Mode::Idle);

        // Idle no se evalúa en el tick de salida
        c.on_tick(cm(40), FAR, 2403);
        assert_eq!(c.mode(), Mode::LeftTriggered);
    }

    #[test]
    fn test_deterministic_replay() {
        let ticks: Vec<(i32, i32, Millis)> = (0..400)
            .map(|i| {
                let t = i as Millis * 15;
                let l = if i % 97 < 30 { 20 + (i % 40) } else { 999 };
                let r = if i % 61 < 25 { 15 + (i % 50) } else { 999 };
                (l, r, t)
            })
            .collect();

        let run = || {
            let mut c = GestureClassifier::default();
            ticks
                .iter()
                .filter_map(|&(l, r, t)| c.on_tick(cm(l), cm(r), t))
                .collect::<Vec<_>>()
        };

        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }

    #[test]
    fn test_reset_clears_session() {
        let mut c = left_triggered(40);
        c.reset();
        assert_eq!(c.mode(), Mode::Idle);
        assert!(c.session().is_none());
    }
}
