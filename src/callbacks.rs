//! The table of application callbacks that input events are routed to.
//!
//! Every event kind has exactly one slot. Registering a callback replaces
//! whatever was in the slot before, and an empty slot silently drops the
//! event.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    PointerEnter,
    PointerLeave,
    PointerMotion,
    ButtonDown,
    ButtonUp,
    Scroll,
    ScrollDiscrete,
    KeyboardEnter,
    KeyboardLeave,
    Keymap,
    KeyDown,
    KeyUp,
    RepeatInfo,
    Modifiers,
}

impl InputEventKind {
    pub const ALL: [InputEventKind; 14] = [
        InputEventKind::PointerEnter,
        InputEventKind::PointerLeave,
        InputEventKind::PointerMotion,
        InputEventKind::ButtonDown,
        InputEventKind::ButtonUp,
        InputEventKind::Scroll,
        InputEventKind::ScrollDiscrete,
        InputEventKind::KeyboardEnter,
        InputEventKind::KeyboardLeave,
        InputEventKind::Keymap,
        InputEventKind::KeyDown,
        InputEventKind::KeyUp,
        InputEventKind::RepeatInfo,
        InputEventKind::Modifiers,
    ];
}

/// An input event with its arguments already translated out of the wire
/// protocol. Coordinates are surface-local, times are the device's
/// millisecond clock and keys are evdev scan codes.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerEnter { x: f64, y: f64 },
    PointerLeave,
    PointerMotion { time: u32, x: f64, y: f64 },
    ButtonDown { time: u32, button: u32 },
    ButtonUp { time: u32, button: u32 },
    Scroll { time: u32, axis: ScrollAxis, value: f64 },
    ScrollDiscrete { axis: ScrollAxis, steps: i32 },
    KeyboardEnter,
    KeyboardLeave,
    Keymap(String),
    KeyDown { key: u32 },
    KeyUp { key: u32 },
    RepeatInfo { rate: i32, delay: i32 },
    Modifiers { depressed: u32, latched: u32, locked: u32 },
}

impl InputEvent {
    pub fn kind(&self) -> InputEventKind {
        match self {
            InputEvent::PointerEnter { .. } => InputEventKind::PointerEnter,
            InputEvent::PointerLeave => InputEventKind::PointerLeave,
            InputEvent::PointerMotion { .. } => InputEventKind::PointerMotion,
            InputEvent::ButtonDown { .. } => InputEventKind::ButtonDown,
            InputEvent::ButtonUp { .. } => InputEventKind::ButtonUp,
            InputEvent::Scroll { .. } => InputEventKind::Scroll,
            InputEvent::ScrollDiscrete { .. } => InputEventKind::ScrollDiscrete,
            InputEvent::KeyboardEnter => InputEventKind::KeyboardEnter,
            InputEvent::KeyboardLeave => InputEventKind::KeyboardLeave,
            InputEvent::Keymap(_) => InputEventKind::Keymap,
            InputEvent::KeyDown { .. } => InputEventKind::KeyDown,
            InputEvent::KeyUp { .. } => InputEventKind::KeyUp,
            InputEvent::RepeatInfo { .. } => InputEventKind::RepeatInfo,
            InputEvent::Modifiers { .. } => InputEventKind::Modifiers,
        }
    }
}

type Slot<F> = Option<Box<F>>;

#[derive(Default)]
pub struct Callbacks {
    pointer_enter: Slot<dyn FnMut(f64, f64)>,
    pointer_leave: Slot<dyn FnMut()>,
    pointer_motion: Slot<dyn FnMut(u32, f64, f64)>,
    button_down: Slot<dyn FnMut(u32, u32)>,
    button_up: Slot<dyn FnMut(u32, u32)>,
    scroll: Slot<dyn FnMut(u32, ScrollAxis, f64)>,
    scroll_discrete: Slot<dyn FnMut(ScrollAxis, i32)>,
    keyboard_enter: Slot<dyn FnMut()>,
    keyboard_leave: Slot<dyn FnMut()>,
    keymap: Slot<dyn FnMut(&str)>,
    key_down: Slot<dyn FnMut(u32)>,
    key_up: Slot<dyn FnMut(u32)>,
    repeat_info: Slot<dyn FnMut(i32, i32)>,
    modifiers: Slot<dyn FnMut(u32, u32, u32)>,
}

impl Callbacks {
    pub fn new() -> Callbacks {
        Callbacks::default()
    }

    pub fn on_pointer_enter(&mut self, f: impl FnMut(f64, f64) + 'static) {
        self.pointer_enter = Some(Box::new(f));
    }

    pub fn on_pointer_leave(&mut self, f: impl FnMut() + 'static) {
        self.pointer_leave = Some(Box::new(f));
    }

    pub fn on_pointer_motion(&mut self, f: impl FnMut(u32, f64, f64) + 'static) {
        self.pointer_motion = Some(Box::new(f));
    }

    pub fn on_button_down(&mut self, f: impl FnMut(u32, u32) + 'static) {
        self.button_down = Some(Box::new(f));
    }

    pub fn on_button_up(&mut self, f: impl FnMut(u32, u32) + 'static) {
        self.button_up = Some(Box::new(f));
    }

    pub fn on_scroll(&mut self, f: impl FnMut(u32, ScrollAxis, f64) + 'static) {
        self.scroll = Some(Box::new(f));
    }

    pub fn on_scroll_discrete(&mut self, f: impl FnMut(ScrollAxis, i32) + 'static) {
        self.scroll_discrete = Some(Box::new(f));
    }

    pub fn on_keyboard_enter(&mut self, f: impl FnMut() + 'static) {
        self.keyboard_enter = Some(Box::new(f));
    }

    pub fn on_keyboard_leave(&mut self, f: impl FnMut() + 'static) {
        self.keyboard_leave = Some(Box::new(f));
    }

    pub fn on_keymap(&mut self, f: impl FnMut(&str) + 'static) {
        self.keymap = Some(Box::new(f));
    }

    pub fn on_key_down(&mut self, f: impl FnMut(u32) + 'static) {
        self.key_down = Some(Box::new(f));
    }

    pub fn on_key_up(&mut self, f: impl FnMut(u32) + 'static) {
        self.key_up = Some(Box::new(f));
    }

    pub fn on_repeat_info(&mut self, f: impl FnMut(i32, i32) + 'static) {
        self.repeat_info = Some(Box::new(f));
    }

    pub fn on_modifiers(&mut self, f: impl FnMut(u32, u32, u32) + 'static) {
        self.modifiers = Some(Box::new(f));
    }

    pub fn unregister(&mut self, kind: InputEventKind) {
        match kind {
            InputEventKind::PointerEnter => self.pointer_enter = None,
            InputEventKind::PointerLeave => self.pointer_leave = None,
            InputEventKind::PointerMotion => self.pointer_motion = None,
            InputEventKind::ButtonDown => self.button_down = None,
            InputEventKind::ButtonUp => self.button_up = None,
            InputEventKind::Scroll => self.scroll = None,
            InputEventKind::ScrollDiscrete => self.scroll_discrete = None,
            InputEventKind::KeyboardEnter => self.keyboard_enter = None,
            InputEventKind::KeyboardLeave => self.keyboard_leave = None,
            InputEventKind::Keymap => self.keymap = None,
            InputEventKind::KeyDown => self.key_down = None,
            InputEventKind::KeyUp => self.key_up = None,
            InputEventKind::RepeatInfo => self.repeat_info = None,
            InputEventKind::Modifiers => self.modifiers = None,
        }
    }

    pub fn is_registered(&self, kind: InputEventKind) -> bool {
        match kind {
            InputEventKind::PointerEnter => self.pointer_enter.is_some(),
            InputEventKind::PointerLeave => self.pointer_leave.is_some(),
            InputEventKind::PointerMotion => self.pointer_motion.is_some(),
            InputEventKind::ButtonDown => self.button_down.is_some(),
            InputEventKind::ButtonUp => self.button_up.is_some(),
            InputEventKind::Scroll => self.scroll.is_some(),
            InputEventKind::ScrollDiscrete => self.scroll_discrete.is_some(),
            InputEventKind::KeyboardEnter => self.keyboard_enter.is_some(),
            InputEventKind::KeyboardLeave => self.keyboard_leave.is_some(),
            InputEventKind::Keymap => self.keymap.is_some(),
            InputEventKind::KeyDown => self.key_down.is_some(),
            InputEventKind::KeyUp => self.key_up.is_some(),
            InputEventKind::RepeatInfo => self.repeat_info.is_some(),
            InputEventKind::Modifiers => self.modifiers.is_some(),
        }
    }

    pub fn emit(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerEnter { x, y } => {
                if let Some(f) = self.pointer_enter.as_mut() {
                    f(x, y);
                }
            }
            InputEvent::PointerLeave => {
                if let Some(f) = self.pointer_leave.as_mut() {
                    f();
                }
            }
            InputEvent::PointerMotion { time, x, y } => {
                if let Some(f) = self.pointer_motion.as_mut() {
                    f(time, x, y);
                }
            }
            InputEvent::ButtonDown { time, button } => {
                if let Some(f) = self.button_down.as_mut() {
                    f(time, button);
                }
            }
            InputEvent::ButtonUp { time, button } => {
                if let Some(f) = self.button_up.as_mut() {
                    f(time, button);
                }
            }
            InputEvent::Scroll { time, axis, value } => {
                if let Some(f) = self.scroll.as_mut() {
                    f(time, axis, value);
                }
            }
            InputEvent::ScrollDiscrete { axis, steps } => {
                if let Some(f) = self.scroll_discrete.as_mut() {
                    f(axis, steps);
                }
            }
            InputEvent::KeyboardEnter => {
                if let Some(f) = self.keyboard_enter.as_mut() {
                    f();
                }
            }
            InputEvent::KeyboardLeave => {
                if let Some(f) = self.keyboard_leave.as_mut() {
                    f();
                }
            }
            InputEvent::Keymap(keymap) => {
                if let Some(f) = self.keymap.as_mut() {
                    f(&keymap);
                }
            }
            InputEvent::KeyDown { key } => {
                if let Some(f) = self.key_down.as_mut() {
                    f(key);
                }
            }
            InputEvent::KeyUp { key } => {
                if let Some(f) = self.key_up.as_mut() {
                    f(key);
                }
            }
            InputEvent::RepeatInfo { rate, delay } => {
                if let Some(f) = self.repeat_info.as_mut() {
                    f(rate, delay);
                }
            }
            InputEvent::Modifiers {
                depressed,
                latched,
                locked,
            } => {
                if let Some(f) = self.modifiers.as_mut() {
                    f(depressed, latched, locked);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn sample(kind: InputEventKind) -> InputEvent {
        match kind {
            InputEventKind::PointerEnter => InputEvent::PointerEnter { x: 1.5, y: 2.0 },
            InputEventKind::PointerLeave => InputEvent::PointerLeave,
            InputEventKind::PointerMotion => InputEvent::PointerMotion {
                time: 7,
                x: 3.25,
                y: 4.0,
            },
            InputEventKind::ButtonDown => InputEvent::ButtonDown {
                time: 8,
                button: 0x110,
            },
            InputEventKind::ButtonUp => InputEvent::ButtonUp {
                time: 9,
                button: 0x111,
            },
            InputEventKind::Scroll => InputEvent::Scroll {
                time: 10,
                axis: ScrollAxis::Vertical,
                value: -10.0,
            },
            InputEventKind::ScrollDiscrete => InputEvent::ScrollDiscrete {
                axis: ScrollAxis::Horizontal,
                steps: 1,
            },
            InputEventKind::KeyboardEnter => InputEvent::KeyboardEnter,
            InputEventKind::KeyboardLeave => InputEvent::KeyboardLeave,
            InputEventKind::Keymap => InputEvent::Keymap("xkb_keymap {};".to_owned()),
            InputEventKind::KeyDown => InputEvent::KeyDown { key: 30 },
            InputEventKind::KeyUp => InputEvent::KeyUp { key: 30 },
            InputEventKind::RepeatInfo => InputEvent::RepeatInfo {
                rate: 25,
                delay: 600,
            },
            InputEventKind::Modifiers => InputEvent::Modifiers {
                depressed: 1,
                latched: 0,
                locked: 2,
            },
        }
    }

    /// Registers a callback in every slot that records the event it was
    /// called with, rebuilt from the callback arguments.
    fn record_all(callbacks: &mut Callbacks) -> Rc<RefCell<Vec<InputEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        macro_rules! record {
            ($register:ident, ($($arg:ident),*) => $event:expr) => {{
                let log = Rc::clone(&log);
                callbacks.$register(move |$($arg),*| log.borrow_mut().push($event));
            }};
        }
        record!(on_pointer_enter, (x, y) => InputEvent::PointerEnter { x, y });
        record!(on_pointer_leave, () => InputEvent::PointerLeave);
        record!(on_pointer_motion, (time, x, y) => InputEvent::PointerMotion {
            time,
            x,
            y
        });
        record!(on_button_down, (time, button) => InputEvent::ButtonDown {
            time,
            button
        });
        record!(on_button_up, (time, button) => InputEvent::ButtonUp {
            time,
            button
        });
        record!(on_scroll, (time, axis, value) => InputEvent::Scroll {
            time,
            axis,
            value
        });
        record!(on_scroll_discrete, (axis, steps) => InputEvent::ScrollDiscrete {
            axis,
            steps
        });
        record!(on_keyboard_enter, () => InputEvent::KeyboardEnter);
        record!(on_keyboard_leave, () => InputEvent::KeyboardLeave);
        record!(on_keymap, (keymap) => InputEvent::Keymap(keymap.to_owned()));
        record!(on_key_down, (key) => InputEvent::KeyDown { key });
        record!(on_key_up, (key) => InputEvent::KeyUp { key });
        record!(on_repeat_info, (rate, delay) => InputEvent::RepeatInfo {
            rate,
            delay
        });
        record!(on_modifiers, (depressed, latched, locked) => {
            InputEvent::Modifiers {
                depressed,
                latched,
                locked,
            }
        });
        log
    }

    #[test]
    fn test_each_kind_reaches_its_own_slot() {
        let mut callbacks = Callbacks::new();
        let log = record_all(&mut callbacks);
        for kind in InputEventKind::ALL {
            assert!(callbacks.is_registered(kind));
            let event = sample(kind);
            assert_eq!(event.kind(), kind);
            callbacks.emit(event.clone());
            assert_eq!(log.borrow().last(), Some(&event));
        }
        assert_eq!(log.borrow().len(), InputEventKind::ALL.len());
    }

    #[test]
    fn test_empty_slots_drop_events() {
        let mut callbacks = Callbacks::new();
        for kind in InputEventKind::ALL {
            assert!(!callbacks.is_registered(kind));
            callbacks.emit(sample(kind));
        }
    }

    #[test]
    fn test_unregister_only_clears_one_slot() {
        let mut callbacks = Callbacks::new();
        let log = record_all(&mut callbacks);
        callbacks.unregister(InputEventKind::KeyDown);
        assert!(!callbacks.is_registered(InputEventKind::KeyDown));
        assert!(callbacks.is_registered(InputEventKind::KeyUp));

        callbacks.emit(InputEvent::KeyDown { key: 1 });
        callbacks.emit(InputEvent::KeyUp { key: 1 });
        assert_eq!(*log.borrow(), [InputEvent::KeyUp { key: 1 }]);
    }

    #[test]
    fn test_registration_replaces_previous() {
        let mut callbacks = Callbacks::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let calls = Rc::clone(&calls);
            callbacks.on_key_down(move |key| calls.borrow_mut().push((tag, key)));
        }
        callbacks.emit(InputEvent::KeyDown { key: 42 });
        assert_eq!(*calls.borrow(), [("second", 42)]);
    }
}
