//! A Wayland client front end: connects to a compositor, binds the globals
//! a windowed application needs, tracks seat devices and turns pointer and
//! keyboard events into application callbacks.

#![allow(clippy::single_match, clippy::match_single_binding)]

pub mod callbacks;
pub mod config;
pub mod display;
pub mod error;
pub mod registry;
pub mod seat;
pub mod session;
pub mod shm;
pub mod wm;

pub use callbacks::{Callbacks, InputEvent, InputEventKind, ScrollAxis};
pub use config::Config;
pub use display::{DisplayServer, Dispatched, State};
pub use error::{Error, ErrorKind, Result};
pub use registry::{Globals, Interface};
pub use seat::{DeviceSource, SeatCapabilities, SeatDevices};
pub use session::{InteractionMode, Session};
pub use shm::{SharedMemory, Shm, SolidBuffer};
pub use wm::WindowManager;
