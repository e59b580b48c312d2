//! OS input hooks
//!
//! A hook delivers raw events for one input device into the capture queue.
//! Hooks run on their own threads and must never block on the consumer.

use crate::capture::queue::EventProducer;
use crate::capture::types::InputKind;
use crate::keyboard::normalizer::Platform;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to spawn hook thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Input hook unavailable: {0}")]
    Unavailable(String),
}

pub type HookResult<T> = Result<T, HookError>;

/// Source of raw events for one input device
pub trait InputHook: Send {
    fn input(&self) -> InputKind;

    /// Key code conventions of the events this hook produces
    fn platform(&self) -> Platform {
        Platform::current()
    }

    /// Begin delivering events. Starting a running hook is a no-op.
    fn start(&mut self, producer: EventProducer) -> HookResult<()>;

    /// Stop delivering events; nothing is enqueued once this returns
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

#[cfg(feature = "os-hooks")]
pub use rdev_backend::RdevHook;

#[cfg(feature = "os-hooks")]
mod rdev_backend {
    use super::{HookError, HookResult, InputHook};
    use crate::capture::queue::EventProducer;
    use crate::capture::types::{InputKind, MouseButton, RawInput, RawKey};
    use crate::keyboard::normalizer::Platform;
    use parking_lot::Mutex;
    use rdev::{listen, Button, Event, EventType, Key};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// State shared by the mouse and keyboard halves of the one global listener
    struct Shared {
        mouse: AtomicBool,
        keyboard: AtomicBool,
        started: AtomicBool,
        producer: Mutex<Option<EventProducer>>,
        /// rdev reports button and wheel events without a position
        position: Mutex<(f64, f64)>,
    }

    impl Shared {
        fn flag(&self, input: InputKind) -> &AtomicBool {
            match input {
                InputKind::Mouse => &self.mouse,
                InputKind::Keyboard => &self.keyboard,
            }
        }

        fn handle(&self, event: &Event) {
            let input = match &event.event_type {
                EventType::KeyPress(key) => self.keyboard_input(*key, event.name.as_deref(), true),
                EventType::KeyRelease(key) => self.keyboard_input(*key, None, false),
                EventType::MouseMove { x, y } => {
                    *self.position.lock() = (*x, *y);
                    self.mouse_input(RawInput::MouseMove { x: *x, y: *y })
                }
                EventType::ButtonPress(button) => self.click(*button, true),
                EventType::ButtonRelease(button) => self.click(*button, false),
                EventType::Wheel { delta_x, delta_y } => {
                    let (x, y) = *self.position.lock();
                    self.mouse_input(RawInput::MouseScroll {
                        x,
                        y,
                        dx: *delta_x as f64,
                        dy: *delta_y as f64,
                    })
                }
            };
            if let Some(input) = input {
                if let Some(producer) = self.producer.lock().as_ref() {
                    producer.push(input);
                }
            }
        }

        fn mouse_input(&self, input: RawInput) -> Option<RawInput> {
            self.mouse.load(Ordering::Relaxed).then_some(input)
        }

        fn click(&self, button: Button, pressed: bool) -> Option<RawInput> {
            let (x, y) = *self.position.lock();
            let button = match button {
                Button::Left => MouseButton::Left,
                Button::Right => MouseButton::Right,
                Button::Middle => MouseButton::Middle,
                Button::Unknown(_) => MouseButton::Unknown,
            };
            self.mouse_input(RawInput::MouseClick {
                x,
                y,
                button,
                pressed,
            })
        }

        fn keyboard_input(&self, key: Key, name: Option<&str>, pressed: bool) -> Option<RawInput> {
            if !self.keyboard.load(Ordering::Relaxed) {
                return None;
            }
            let ch = name.and_then(|s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            });
            Some(RawInput::Key {
                key: raw_key(key, ch),
                pressed,
            })
        }
    }

    /// Symbolic name for keys without a character
    fn key_name(key: Key) -> Option<&'static str> {
        Some(match key {
            Key::Alt => "alt",
            Key::AltGr => "alt_gr",
            Key::Backspace => "backspace",
            Key::CapsLock => "caps_lock",
            Key::ControlLeft => "ctrl_l",
            Key::ControlRight => "ctrl_r",
            Key::Delete => "delete",
            Key::DownArrow => "down",
            Key::End => "end",
            Key::Escape => "esc",
            Key::F1 => "f1",
            Key::F2 => "f2",
            Key::F3 => "f3",
            Key::F4 => "f4",
            Key::F5 => "f5",
            Key::F6 => "f6",
            Key::F7 => "f7",
            Key::F8 => "f8",
            Key::F9 => "f9",
            Key::F10 => "f10",
            Key::F11 => "f11",
            Key::F12 => "f12",
            Key::Home => "home",
            Key::LeftArrow => "left",
            Key::MetaLeft => "cmd",
            Key::MetaRight => "cmd_r",
            Key::PageDown => "page_down",
            Key::PageUp => "page_up",
            Key::Return => "enter",
            Key::RightArrow => "right",
            Key::ShiftLeft => "shift",
            Key::ShiftRight => "shift_r",
            Key::Space => "space",
            Key::Tab => "tab",
            Key::UpArrow => "up",
            Key::PrintScreen => "print_screen",
            Key::ScrollLock => "scroll_lock",
            Key::Pause => "pause",
            Key::NumLock => "num_lock",
            Key::Insert => "insert",
            Key::Function => "function",
            Key::KpMinus => "subtract",
            Key::KpPlus => "add",
            Key::KpMultiply => "multiply",
            Key::KpDivide => "divide",
            Key::KpDelete => "decimal",
            Key::Kp0 => "numpad0",
            Key::Kp1 => "numpad1",
            Key::Kp2 => "numpad2",
            Key::Kp3 => "numpad3",
            Key::Kp4 => "numpad4",
            Key::Kp5 => "numpad5",
            Key::Kp6 => "numpad6",
            Key::Kp7 => "numpad7",
            Key::Kp8 => "numpad8",
            Key::Kp9 => "numpad9",
            _ => return None,
        })
    }

    /// Virtual-key code in Windows numbering for keys producing a character
    fn key_code(key: Key) -> Option<u32> {
        let letter = |c: u8| Some(u32::from(c));
        match key {
            Key::KeyA => letter(b'A'),
            Key::KeyB => letter(b'B'),
            Key::KeyC => letter(b'C'),
            Key::KeyD => letter(b'D'),
            Key::KeyE => letter(b'E'),
            Key::KeyF => letter(b'F'),
            Key::KeyG => letter(b'G'),
            Key::KeyH => letter(b'H'),
            Key::KeyI => letter(b'I'),
            Key::KeyJ => letter(b'J'),
            Key::KeyK => letter(b'K'),
            Key::KeyL => letter(b'L'),
            Key::KeyM => letter(b'M'),
            Key::KeyN => letter(b'N'),
            Key::KeyO => letter(b'O'),
            Key::KeyP => letter(b'P'),
            Key::KeyQ => letter(b'Q'),
            Key::KeyR => letter(b'R'),
            Key::KeyS => letter(b'S'),
            Key::KeyT => letter(b'T'),
            Key::KeyU => letter(b'U'),
            Key::KeyV => letter(b'V'),
            Key::KeyW => letter(b'W'),
            Key::KeyX => letter(b'X'),
            Key::KeyY => letter(b'Y'),
            Key::KeyZ => letter(b'Z'),
            Key::Num0 => letter(b'0'),
            Key::Num1 => letter(b'1'),
            Key::Num2 => letter(b'2'),
            Key::Num3 => letter(b'3'),
            Key::Num4 => letter(b'4'),
            Key::Num5 => letter(b'5'),
            Key::Num6 => letter(b'6'),
            Key::Num7 => letter(b'7'),
            Key::Num8 => letter(b'8'),
            Key::Num9 => letter(b'9'),
            Key::BackQuote => Some(192),
            Key::Minus => Some(189),
            Key::Equal => Some(187),
            Key::LeftBracket => Some(219),
            Key::RightBracket => Some(221),
            Key::SemiColon => Some(186),
            Key::Quote => Some(222),
            Key::BackSlash => Some(220),
            Key::IntlBackslash => Some(226),
            Key::Comma => Some(188),
            Key::Dot => Some(190),
            Key::Slash => Some(191),
            Key::Unknown(code) => Some(code),
            _ => None,
        }
    }

    fn raw_key(key: Key, ch: Option<char>) -> RawKey {
        if key == Key::KpReturn {
            return RawKey::named("enter").with_vk(13).with_extended(true);
        }
        match key_name(key) {
            Some(name) => RawKey::named(name),
            None => RawKey::code(ch, key_code(key)),
        }
    }

    /// One half of the process-wide rdev listener.
    ///
    /// rdev cannot unregister its hook, so stopping closes the gate and the
    /// listener thread keeps running idle.
    pub struct RdevHook {
        input: InputKind,
        shared: Arc<Shared>,
    }

    impl RdevHook {
        /// Mouse and keyboard hooks sharing one listener thread
        pub fn pair() -> (RdevHook, RdevHook) {
            let shared = Arc::new(Shared {
                mouse: AtomicBool::new(false),
                keyboard: AtomicBool::new(false),
                started: AtomicBool::new(false),
                producer: Mutex::new(None),
                position: Mutex::new((0.0, 0.0)),
            });
            (
                RdevHook {
                    input: InputKind::Mouse,
                    shared: shared.clone(),
                },
                RdevHook {
                    input: InputKind::Keyboard,
                    shared,
                },
            )
        }
    }

    impl InputHook for RdevHook {
        fn input(&self) -> InputKind {
            self.input
        }

        /// Keys are reported in Windows numbering on Windows, portable elsewhere
        fn platform(&self) -> Platform {
            match Platform::current() {
                Platform::Windows => Platform::Windows,
                _ => Platform::Linux,
            }
        }

        fn start(&mut self, producer: EventProducer) -> HookResult<()> {
            *self.shared.producer.lock() = Some(producer);
            self.shared.flag(self.input).store(true, Ordering::SeqCst);

            if self.shared.started.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let shared = self.shared.clone();
            let spawned = thread::Builder::new()
                .name("inputscope-hook".to_string())
                .spawn(move || {
                    let callback_shared = shared.clone();
                    if let Err(e) = listen(move |event| callback_shared.handle(&event)) {
                        tracing::error!("Input hook stopped: {:?}", e);
                    }
                    shared.started.store(false, Ordering::SeqCst);
                    shared.mouse.store(false, Ordering::SeqCst);
                    shared.keyboard.store(false, Ordering::SeqCst);
                });
            if let Err(e) = spawned {
                self.shared.started.store(false, Ordering::SeqCst);
                self.shared.flag(self.input).store(false, Ordering::SeqCst);
                return Err(HookError::Spawn(e));
            }
            tracing::info!("Started {} hook", self.input);
            Ok(())
        }

        fn stop(&mut self) {
            self.shared.flag(self.input).store(false, Ordering::SeqCst);
            tracing::info!("Stopped {} hook", self.input);
        }

        fn is_running(&self) -> bool {
            self.shared.flag(self.input).load(Ordering::SeqCst)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_raw_key_mapping() {
            assert_eq!(raw_key(Key::ControlLeft, None), RawKey::named("ctrl_l"));
            assert_eq!(raw_key(Key::KeyQ, Some('q')), RawKey::code(Some('q'), Some(81)));
            assert_eq!(raw_key(Key::Minus, Some('-')), RawKey::code(Some('-'), Some(189)));
            assert_eq!(
                raw_key(Key::KpReturn, None),
                RawKey::named("enter").with_vk(13).with_extended(true)
            );
        }

        #[test]
        fn test_error_display() {
            let e = HookError::Unavailable("no display".to_string());
            assert_eq!(e.to_string(), "Input hook unavailable: no display");
        }
    }
}
