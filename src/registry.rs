use crate::{display::State, seat, shm::Shm, wm::WindowManager};
use tracing::{debug, trace};
use wayland_client::{
    protocol::{
        wl_compositor::WlCompositor,
        wl_registry::{self, WlRegistry},
        wl_seat::WlSeat,
        wl_subcompositor::WlSubcompositor,
        wl_surface::WlSurface,
    },
    Connection, Dispatch, Proxy, QueueHandle,
};

pub(crate) const COMPOSITOR_VERSION: u32 = 4;
pub(crate) const SUBCOMPOSITOR_VERSION: u32 = 1;

/// The globals the application cannot run without.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interface {
    Shm,
    Compositor,
    Subcompositor,
    WmBase,
    Seat,
}

impl Interface {
    pub const ALL: [Interface; 5] = [
        Interface::Shm,
        Interface::Compositor,
        Interface::Subcompositor,
        Interface::WmBase,
        Interface::Seat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Interface::Shm => "wl_shm",
            Interface::Compositor => "wl_compositor",
            Interface::Subcompositor => "wl_subcompositor",
            Interface::WmBase => "xdg_wm_base",
            Interface::Seat => "wl_seat",
        }
    }

    pub fn from_name(name: &str) -> Option<Interface> {
        Interface::ALL
            .into_iter()
            .find(|interface| interface.name() == name)
    }
}

/// Handles bound from the registry. Everything stays `None` until the
/// compositor announces it.
#[derive(Default)]
pub struct Globals {
    pub(crate) shm: Option<Shm>,
    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) subcompositor: Option<WlSubcompositor>,
    pub(crate) wm: Option<WindowManager>,
    pub(crate) seats: Vec<WlSeat>,
}

impl Globals {
    pub fn shm(&self) -> Option<&Shm> {
        self.shm.as_ref()
    }

    pub fn compositor(&self) -> Option<&WlCompositor> {
        self.compositor.as_ref()
    }

    pub fn subcompositor(&self) -> Option<&WlSubcompositor> {
        self.subcompositor.as_ref()
    }

    pub fn window_manager(&self) -> Option<&WindowManager> {
        self.wm.as_ref()
    }

    /// The first seat the compositor announced.
    pub fn seat(&self) -> Option<&WlSeat> {
        self.seats.first()
    }

    pub fn is_bound(&self, interface: Interface) -> bool {
        match interface {
            Interface::Shm => self.shm.is_some(),
            Interface::Compositor => self.compositor.is_some(),
            Interface::Subcompositor => self.subcompositor.is_some(),
            Interface::WmBase => self.wm.is_some(),
            Interface::Seat => !self.seats.is_empty(),
        }
    }

    pub fn missing(&self) -> Vec<Interface> {
        Interface::ALL
            .into_iter()
            .filter(|&interface| !self.is_bound(interface))
            .collect()
    }

    fn bind(
        &mut self,
        registry: &WlRegistry,
        name: u32,
        interface: Interface,
        version: u32,
        qhandle: &QueueHandle<State>,
    ) {
        if interface != Interface::Seat && self.is_bound(interface) {
            debug!("ignoring duplicate {} global {name}", interface.name());
            return;
        }
        debug!("binding {} global {name} (v{version})", interface.name());
        match interface {
            Interface::Shm => self.shm = Some(Shm::bind(registry, name, version, qhandle)),
            Interface::Compositor => {
                self.compositor = Some(registry.bind(
                    name,
                    version.min(COMPOSITOR_VERSION),
                    qhandle,
                    (),
                ));
            }
            Interface::Subcompositor => {
                self.subcompositor = Some(registry.bind(
                    name,
                    version.min(SUBCOMPOSITOR_VERSION),
                    qhandle,
                    (),
                ));
            }
            Interface::WmBase => {
                self.wm = Some(WindowManager::bind(registry, name, version, qhandle));
            }
            Interface::Seat => {
                self.seats
                    .push(seat::bind_seat(registry, name, version, qhandle));
            }
        }
    }

    /// Releases every bound global, most dependent first. Safe to call with
    /// any subset bound, and again afterwards.
    pub(crate) fn unbind(&mut self) {
        for seat in self.seats.drain(..).rev() {
            seat::release_seat(seat);
        }
        if let Some(wm) = self.wm.take() {
            wm.unbind();
        }
        if let Some(subcompositor) = self.subcompositor.take() {
            subcompositor.destroy();
        }
        // wl_compositor has no destructor request.
        self.compositor = None;
        if let Some(shm) = self.shm.take() {
            shm.unbind();
        }
    }
}

impl Dispatch<WlRegistry, ()> for State {
    fn event(
        state: &mut Self,
        proxy: &WlRegistry,
        event: wl_registry::Event,
        &(): &(),
        _conn: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        use wl_registry::Event;
        match event {
            Event::Global {
                name,
                interface,
                version,
            } => match Interface::from_name(&interface) {
                Some(known) => state.globals.bind(proxy, name, known, version, qhandle),
                None => trace!("ignoring global {name} {interface} (v{version})"),
            },
            Event::GlobalRemove { name } => {
                debug!("global {name} removed, hot removal is not supported");
            }
            _ => {}
        }
    }
}

macro_rules! empty_dispatch {
    ($($t:ty),*) => {
        $(
            impl Dispatch<$t, ()> for State {
                fn event(
                    _: &mut Self,
                    _: &$t,
                    _: <$t as Proxy>::Event,
                    _: &(),
                    _: &Connection,
                    _: &QueueHandle<Self>,
                ) {
                }
            }
        )*
    };
}

empty_dispatch![WlCompositor, WlSubcompositor, WlSurface];
