use crate::display::State;
use tracing::trace;
use wayland_client::{protocol::wl_registry::WlRegistry, Connection, Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::xdg_wm_base::{self, XdgWmBase};

pub(crate) const WM_BASE_VERSION: u32 = 2;

/// The xdg-shell global. The compositor pings it to check the client is
/// still responsive, so it has to be answered even before any window exists.
pub struct WindowManager {
    wm_base: XdgWmBase,
}

impl WindowManager {
    pub(crate) fn bind(
        registry: &WlRegistry,
        name: u32,
        version: u32,
        qhandle: &QueueHandle<State>,
    ) -> WindowManager {
        WindowManager {
            wm_base: registry.bind(name, version.min(WM_BASE_VERSION), qhandle, ()),
        }
    }

    pub fn wm_base(&self) -> &XdgWmBase {
        &self.wm_base
    }

    pub(crate) fn unbind(self) {
        self.wm_base.destroy();
    }
}

impl Dispatch<XdgWmBase, ()> for State {
    fn event(
        _state: &mut Self,
        proxy: &XdgWmBase,
        event: xdg_wm_base::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use xdg_wm_base::Event;
        match event {
            Event::Ping { serial } => {
                trace!("pong {serial}");
                proxy.pong(serial);
            }
            _ => {}
        }
    }
}
