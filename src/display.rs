use crate::{
    callbacks::Callbacks,
    error::{Error, ErrorKind, Result},
    registry::{Globals, Interface},
    seat::{self, SeatDevices},
    session::Session,
    shm::SolidBuffer,
};
use rustix::{
    event::{PollFd, PollFlags},
    io::Errno,
};
use std::{
    ffi::OsStr,
    io,
    os::{fd::BorrowedFd, unix::net::UnixStream},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};
use wayland_client::{
    backend::WaylandError,
    protocol::{
        wl_keyboard::WlKeyboard, wl_pointer::WlPointer, wl_registry::WlRegistry, wl_shm::Format,
    },
    Connection, EventQueue, QueueHandle,
};

/// Everything the event handlers can touch while the queue is dispatched.
pub struct State {
    pub(crate) globals: Globals,
    pub(crate) devices: SeatDevices<WlPointer, WlKeyboard>,
    pub(crate) callbacks: Callbacks,
    pub(crate) session: Session,
}

impl State {
    fn new(session: Session) -> State {
        State {
            globals: Globals::default(),
            devices: SeatDevices::new(),
            callbacks: Callbacks::new(),
            session,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Events(usize),
    /// Nothing was dispatched before the timeout ran out.
    TimedOut,
}

/// The connection to the compositor and everything bound through it.
pub struct DisplayServer {
    conn: Connection,
    queue: EventQueue<State>,
    registry: Option<WlRegistry>,
    state: State,
    dispatch_timeout: Option<Duration>,
}

#[track_caller]
fn connect_failure(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
    Error::with_source(ErrorKind::DisplayConnectFailure, err)
}

#[track_caller]
fn processing_failure(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
    Error::with_source(ErrorKind::ServerProcessingFailure, err)
}

/// Resolves a display name the way `WAYLAND_DISPLAY` is resolved.
fn socket_path(display: &OsStr) -> Option<PathBuf> {
    let display = Path::new(display);
    if display.is_absolute() {
        return Some(display.to_owned());
    }
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")?;
    Some(PathBuf::from(runtime_dir).join(display))
}

impl DisplayServer {
    /// Connects to the compositor named by `WAYLAND_SOCKET` or
    /// `WAYLAND_DISPLAY`.
    #[track_caller]
    pub fn connect_to_env() -> Result<DisplayServer> {
        let conn = Connection::connect_to_env().map_err(|err| connect_failure(err))?;
        Ok(DisplayServer::new(conn))
    }

    #[track_caller]
    pub fn connect_to(display: impl AsRef<OsStr>) -> Result<DisplayServer> {
        let display = display.as_ref();
        let path = socket_path(display).ok_or_else(|| {
            connect_failure(format!(
                "{display:?} is not an absolute path and XDG_RUNTIME_DIR is unset"
            ))
        })?;
        let stream = UnixStream::connect(&path).map_err(|err| connect_failure(err))?;
        debug!("connected to {}", path.display());
        DisplayServer::from_stream(stream)
    }

    #[track_caller]
    pub fn from_stream(stream: UnixStream) -> Result<DisplayServer> {
        let conn = Connection::from_socket(stream).map_err(|err| connect_failure(err))?;
        Ok(DisplayServer::new(conn))
    }

    fn new(conn: Connection) -> DisplayServer {
        let queue = conn.new_event_queue();
        DisplayServer {
            conn,
            queue,
            registry: None,
            state: State::new(Session::new()),
            dispatch_timeout: None,
        }
    }

    /// Binds the globals the application needs and waits for the
    /// compositor to announce all of them.
    pub fn setup(&mut self) -> Result<()> {
        if self.registry.is_none() {
            let qhandle = self.queue.handle();
            self.registry = Some(self.conn.display().get_registry(&qhandle, ()));
        }
        self.roundtrip()?;
        let missing = self.state.globals.missing();
        if !missing.is_empty() {
            return Err(Error::new(ErrorKind::CompositorMissingFeatures(missing)));
        }
        info!(
            seats = self.state.globals.seats.len(),
            "display server ready"
        );
        Ok(())
    }

    pub fn roundtrip(&mut self) -> Result<usize> {
        self.queue
            .roundtrip(&mut self.state)
            .map_err(|err| processing_failure(err))
    }

    /// Reads and handles events. Without a timeout this blocks until the
    /// compositor sends something.
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> Result<Dispatched> {
        let Some(timeout) = timeout else {
            let n = self
                .queue
                .blocking_dispatch(&mut self.state)
                .map_err(|err| processing_failure(err))?;
            return Ok(Dispatched::Events(n));
        };

        let n = self
            .queue
            .dispatch_pending(&mut self.state)
            .map_err(|err| processing_failure(err))?;
        if n > 0 {
            return Ok(Dispatched::Events(n));
        }

        self.queue.flush().map_err(|err| processing_failure(err))?;
        if let Some(guard) = self.queue.prepare_read() {
            if !wait_readable(guard.connection_fd(), timeout)? {
                return Ok(Dispatched::TimedOut);
            }
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(processing_failure(err)),
            }
        }

        let n = self
            .queue
            .dispatch_pending(&mut self.state)
            .map_err(|err| processing_failure(err))?;
        Ok(match n {
            0 => Dispatched::TimedOut,
            n => Dispatched::Events(n),
        })
    }

    /// One iteration of the application's event pump.
    pub fn check(&mut self) -> Result<Dispatched> {
        let dispatched = self.dispatch(self.dispatch_timeout)?;
        self.state.session.first_poll = false;
        Ok(dispatched)
    }

    pub fn set_dispatch_timeout(&mut self, timeout: Option<Duration>) {
        self.dispatch_timeout = timeout;
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.state.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.state.callbacks
    }

    pub fn session(&self) -> &Session {
        &self.state.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.state.session
    }

    pub fn globals(&self) -> &Globals {
        &self.state.globals
    }

    pub fn pointer(&self) -> Option<&WlPointer> {
        self.state.devices.pointer()
    }

    pub fn keyboard(&self) -> Option<&WlKeyboard> {
        self.state.devices.keyboard()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn queue_handle(&self) -> QueueHandle<State> {
        self.queue.handle()
    }

    #[track_caller]
    pub fn create_solid_buffer(
        &self,
        width: u32,
        height: u32,
        format: Format,
        color: u32,
    ) -> Result<SolidBuffer> {
        let shm = self.state.globals.shm().ok_or_else(|| {
            Error::new(ErrorKind::CompositorMissingFeatures(vec![Interface::Shm]))
        })?;
        shm.create_solid_buffer(&self.queue.handle(), width, height, format, color)
    }

    /// Releases devices, then globals, then flushes the destructor requests.
    fn teardown(&mut self) {
        if let Some(pointer) = self.state.devices.take_pointer() {
            seat::release_pointer(pointer);
        }
        if let Some(keyboard) = self.state.devices.take_keyboard() {
            seat::release_keyboard(keyboard);
        }
        self.state.globals.unbind();
        self.registry = None;
        if let Err(err) = self.conn.flush() {
            debug!("could not flush teardown requests: {err}");
        }
    }

    pub fn close(mut self) {
        self.teardown();
        info!(
            uptime = ?self.state.session.uptime(),
            "disconnected from display server"
        );
    }
}

impl Drop for DisplayServer {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Waits until the socket is readable. Returns `false` when the timeout ran
/// out or a signal interrupted the wait.
fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> Result<bool> {
    let mut fds = [PollFd::new(&fd, PollFlags::IN)];
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    match rustix::event::poll(&mut fds, millis) {
        Ok(0) | Err(Errno::INTR) => Ok(false),
        Ok(_) => Ok(true),
        Err(err) => Err(processing_failure(err)),
    }
}
