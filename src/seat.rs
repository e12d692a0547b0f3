use crate::{
    callbacks::{InputEvent, ScrollAxis},
    display::State,
    session::InteractionMode,
};
use bitflags::bitflags;
use memmap2::MmapOptions;
use std::{fs::File, io, os::fd::OwnedFd};
use tracing::{debug, warn};
use wayland_client::{
    protocol::{
        wl_keyboard::{self, KeyState, KeymapFormat, WlKeyboard},
        wl_pointer::{self, Axis, ButtonState, WlPointer},
        wl_registry::WlRegistry,
        wl_seat::{self, WlSeat},
    },
    Connection, Dispatch, Proxy, QueueHandle, WEnum,
};

/// Highest `wl_seat` version bound. Version 8 replaces `axis_discrete` with
/// `axis_value120`.
pub(crate) const SEAT_VERSION: u32 = 7;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1 << 0;
        const KEYBOARD = 1 << 1;
        const TOUCH = 1 << 2;
    }
}

/// Where the seat state machine gets its devices from.
pub trait DeviceSource {
    type Pointer;
    type Keyboard;

    fn acquire_pointer(&mut self) -> Self::Pointer;
    fn release_pointer(&mut self, pointer: Self::Pointer);
    fn acquire_keyboard(&mut self) -> Self::Keyboard;
    fn release_keyboard(&mut self, keyboard: Self::Keyboard);
}

struct Owned<T> {
    seat: u32,
    device: T,
}

/// The one pointer and one keyboard the application listens to.
///
/// Devices belong to the seat (identified by its registry name) that first
/// offered them. Capability changes on any other seat leave them alone.
pub struct SeatDevices<P, K> {
    pointer: Option<Owned<P>>,
    keyboard: Option<Owned<K>>,
}

impl<P, K> Default for SeatDevices<P, K> {
    fn default() -> Self {
        SeatDevices {
            pointer: None,
            keyboard: None,
        }
    }
}

impl<P, K> SeatDevices<P, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> Option<&P> {
        self.pointer.as_ref().map(|owned| &owned.device)
    }

    pub fn keyboard(&self) -> Option<&K> {
        self.keyboard.as_ref().map(|owned| &owned.device)
    }

    pub fn update(
        &mut self,
        seat: u32,
        capabilities: SeatCapabilities,
        source: &mut impl DeviceSource<Pointer = P, Keyboard = K>,
        mode: &mut InteractionMode,
    ) {
        let has_pointer = capabilities.contains(SeatCapabilities::POINTER);
        match &self.pointer {
            None if has_pointer => {
                debug!(seat, "pointer attached");
                let device = source.acquire_pointer();
                self.pointer = Some(Owned { seat, device });
                *mode = InteractionMode::Full;
            }
            Some(owned) if !has_pointer && owned.seat == seat => {
                debug!(seat, "pointer detached");
                if let Some(owned) = self.pointer.take() {
                    source.release_pointer(owned.device);
                }
                *mode = InteractionMode::KeyboardOnlyLocked;
            }
            _ => {}
        }

        let has_keyboard = capabilities.contains(SeatCapabilities::KEYBOARD);
        match &self.keyboard {
            None if has_keyboard => {
                debug!(seat, "keyboard attached");
                let device = source.acquire_keyboard();
                self.keyboard = Some(Owned { seat, device });
            }
            Some(owned) if !has_keyboard && owned.seat == seat => {
                debug!(seat, "keyboard detached");
                if let Some(owned) = self.keyboard.take() {
                    source.release_keyboard(owned.device);
                }
            }
            _ => {}
        }
    }

    pub fn take_pointer(&mut self) -> Option<P> {
        self.pointer.take().map(|owned| owned.device)
    }

    pub fn take_keyboard(&mut self) -> Option<K> {
        self.keyboard.take().map(|owned| owned.device)
    }
}

struct WaylandSeat<'a> {
    seat: &'a WlSeat,
    qhandle: &'a QueueHandle<State>,
}

impl DeviceSource for WaylandSeat<'_> {
    type Pointer = WlPointer;
    type Keyboard = WlKeyboard;

    fn acquire_pointer(&mut self) -> WlPointer {
        self.seat.get_pointer(self.qhandle, ())
    }

    fn release_pointer(&mut self, pointer: WlPointer) {
        release_pointer(pointer);
    }

    fn acquire_keyboard(&mut self) -> WlKeyboard {
        self.seat.get_keyboard(self.qhandle, ())
    }

    fn release_keyboard(&mut self, keyboard: WlKeyboard) {
        release_keyboard(keyboard);
    }
}

pub(crate) fn release_pointer(pointer: WlPointer) {
    if pointer.version() >= 3 {
        pointer.release();
    }
}

pub(crate) fn release_keyboard(keyboard: WlKeyboard) {
    if keyboard.version() >= 3 {
        keyboard.release();
    }
}

pub(crate) fn release_seat(seat: WlSeat) {
    if seat.version() >= 5 {
        seat.release();
    }
}

pub(crate) fn bind_seat(
    registry: &WlRegistry,
    name: u32,
    version: u32,
    qhandle: &QueueHandle<State>,
) -> WlSeat {
    registry.bind::<WlSeat, u32, State>(name, version.min(SEAT_VERSION), qhandle, name)
}

impl Dispatch<WlSeat, u32> for State {
    fn event(
        state: &mut Self,
        proxy: &WlSeat,
        event: wl_seat::Event,
        &name: &u32,
        _conn: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        use wl_seat::Event;
        match event {
            Event::Capabilities { capabilities } => {
                let bits = match capabilities {
                    WEnum::Value(capabilities) => capabilities.bits(),
                    WEnum::Unknown(raw) => raw,
                };
                let mut source = WaylandSeat {
                    seat: proxy,
                    qhandle,
                };
                state.devices.update(
                    name,
                    SeatCapabilities::from_bits_truncate(bits),
                    &mut source,
                    &mut state.session.interaction_mode,
                );
            }
            Event::Name { name: seat_name } => {
                debug!(seat = name, "seat is named {seat_name:?}");
            }
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, ()> for State {
    fn event(
        state: &mut Self,
        _proxy: &WlPointer,
        event: wl_pointer::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        if let Some(event) = translate_pointer(event) {
            state.callbacks.emit(event);
        }
    }
}

impl Dispatch<WlKeyboard, ()> for State {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        if let Some(event) = translate_keyboard(event) {
            state.callbacks.emit(event);
        }
    }
}

fn scroll_axis(axis: WEnum<Axis>) -> Option<ScrollAxis> {
    match axis {
        WEnum::Value(Axis::VerticalScroll) => Some(ScrollAxis::Vertical),
        WEnum::Value(Axis::HorizontalScroll) => Some(ScrollAxis::Horizontal),
        WEnum::Value(_) | WEnum::Unknown(_) => None,
    }
}

fn translate_pointer(event: wl_pointer::Event) -> Option<InputEvent> {
    use wl_pointer::Event;
    match event {
        Event::Enter {
            serial: _,
            surface: _,
            surface_x,
            surface_y,
        } => Some(InputEvent::PointerEnter {
            x: surface_x,
            y: surface_y,
        }),
        Event::Leave {
            serial: _,
            surface: _,
        } => Some(InputEvent::PointerLeave),
        Event::Motion {
            time,
            surface_x,
            surface_y,
        } => Some(InputEvent::PointerMotion {
            time,
            x: surface_x,
            y: surface_y,
        }),
        Event::Button {
            serial: _,
            time,
            button,
            state,
        } => match state {
            WEnum::Value(ButtonState::Pressed) => Some(InputEvent::ButtonDown { time, button }),
            WEnum::Value(ButtonState::Released) => Some(InputEvent::ButtonUp { time, button }),
            WEnum::Value(_) | WEnum::Unknown(_) => None,
        },
        Event::Axis { time, axis, value } => Some(InputEvent::Scroll {
            time,
            axis: scroll_axis(axis)?,
            value,
        }),
        Event::AxisDiscrete { axis, discrete } => Some(InputEvent::ScrollDiscrete {
            axis: scroll_axis(axis)?,
            steps: discrete,
        }),
        _ => None,
    }
}

fn translate_keyboard(event: wl_keyboard::Event) -> Option<InputEvent> {
    use wl_keyboard::Event;
    match event {
        Event::Keymap { format, fd, size } => match format {
            WEnum::Value(KeymapFormat::XkbV1) => match read_keymap(fd, size) {
                Ok(keymap) => Some(InputEvent::Keymap(keymap)),
                Err(err) => {
                    warn!("dropping keymap that could not be read: {err}");
                    None
                }
            },
            WEnum::Value(_) | WEnum::Unknown(_) => None,
        },
        Event::Enter {
            serial: _,
            surface: _,
            keys: _,
        } => Some(InputEvent::KeyboardEnter),
        Event::Leave {
            serial: _,
            surface: _,
        } => Some(InputEvent::KeyboardLeave),
        Event::Key {
            serial: _,
            time: _,
            key,
            state,
        } => match state {
            WEnum::Value(KeyState::Pressed) => Some(InputEvent::KeyDown { key }),
            WEnum::Value(KeyState::Released) => Some(InputEvent::KeyUp { key }),
            WEnum::Value(_) | WEnum::Unknown(_) => None,
        },
        Event::Modifiers {
            serial: _,
            mods_depressed,
            mods_latched,
            mods_locked,
            group: _,
        } => Some(InputEvent::Modifiers {
            depressed: mods_depressed,
            latched: mods_latched,
            locked: mods_locked,
        }),
        Event::RepeatInfo { rate, delay } => Some(InputEvent::RepeatInfo { rate, delay }),
        _ => None,
    }
}

/// Maps the keymap the compositor sent and copies it out as text. The
/// mapping is private since newer compositors hand out sealed files.
fn read_keymap(fd: OwnedFd, size: u32) -> io::Result<String> {
    let file = File::from(fd);
    let mmap = unsafe {
        MmapOptions::new()
            .len(size as usize)
            .map_copy_read_only(&file)?
    };
    let text = std::str::from_utf8(&mmap)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(text.trim_end_matches('\0').to_owned())
}
