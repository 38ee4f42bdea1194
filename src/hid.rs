use std::time::Duration;
use uinput::device::Device;
use uinput::event::keyboard;

use crate::types::GestureDirection;

/// Acción de teclado asociada a cada gesto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    Next,
    Previous,
    ScrollUp,
    ScrollDown,
    ZoomIn,
    ZoomOut,
}

impl From<GestureDirection> for GestureAction {
    fn from(direction: GestureDirection) -> Self {
        match direction {
            GestureDirection::HorizontalLeftToRight => GestureAction::Next,
            GestureDirection::HorizontalRightToLeft => GestureAction::Previous,
            GestureDirection::LeftUp => GestureAction::ScrollUp,
            GestureDirection::LeftDown => GestureAction::ScrollDown,
            GestureDirection::RightUp => GestureAction::ZoomIn,
            GestureDirection::RightDown => GestureAction::ZoomOut,
        }
    }
}

/// Teclado virtual en /dev/uinput
pub struct HidOutput {
    dev: Device,
}

impl HidOutput {
    pub fn new() -> Result<Self, uinput::Error> {
        let dev = uinput::default()?
            .name("barrido-hid")?
            .event(uinput::event::Keyboard::All)?
            .create()?;

        Ok(HidOutput { dev })
    }

    fn sync(&mut self) -> Result<(), uinput::Error> {
        self.dev.synchronize()
    }

    fn key_tap(&mut self, key: keyboard::Key) -> Result<(), uinput::Error> {
        self.dev.press(&keyboard::Keyboard::Key(key))?;
        self.sync()?;
        std::thread::sleep(Duration::from_millis(10));
        self.dev.release(&keyboard::Keyboard::Key(key))?;
        self.sync()
    }

    fn ctrl_combo(&mut self, key: keyboard::Key) -> Result<(), uinput::Error> {
        self.dev
            .press(&keyboard::Keyboard::Key(keyboard::Key::LeftControl))?;
        self.sync()?;
        std::thread::sleep(Duration::from_millis(10));
        self.key_tap(key)?;
        self.dev
            .release(&keyboard::Keyboard::Key(keyboard::Key::LeftControl))?;
        self.sync()
    }

    pub fn send(&mut self, action: GestureAction) -> Result<(), uinput::Error> {
        match action {
            GestureAction::Next => self.key_tap(keyboard::Key::Right),
            GestureAction::Previous => self.key_tap(keyboard::Key::Left),
            GestureAction::ScrollUp => self.key_tap(keyboard::Key::Up),
            GestureAction::ScrollDown => self.key_tap(keyboard::Key::Down),
            GestureAction::ZoomIn => self.ctrl_combo(keyboard::Key::Equal),
            GestureAction::ZoomOut => self.ctrl_combo(keyboard::Key::Minus),
        }
    }
}
