use anyhow::Result;
use clap::Parser;
use std::{cell::Cell, path::PathBuf, rc::Rc, time::Duration};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wayfront::{Config, DisplayServer, Dispatched, ScrollAxis};

/// Scan code of the escape key.
const KEY_ESC: u32 = 1;

#[derive(Parser, Debug)]
#[command(version, about = "Connect to a Wayland compositor and log seat input")]
struct Args {
    /// Config file to read instead of $XDG_CONFIG_HOME/wayfront/config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display socket name or absolute path.
    #[arg(long)]
    display: Option<String>,

    /// Milliseconds to wait per poll. 0 only dispatches what is pending.
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(display) = args.display {
        config.display = Some(display);
    }
    if let Some(millis) = args.timeout {
        config.dispatch_timeout = Some(Duration::from_millis(millis));
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    debug!(?config, "loaded config");

    let mut server = match &config.display {
        Some(display) => DisplayServer::connect_to(display),
        None => DisplayServer::connect_to_env(),
    }
    .unwrap_or_else(|err| err.report());
    server.set_dispatch_timeout(config.dispatch_timeout);
    server.setup().unwrap_or_else(|err| err.report());

    let quit = Rc::new(Cell::new(false));
    register_logging(&mut server, &quit);

    while !quit.get() {
        match server.check().unwrap_or_else(|err| err.report()) {
            Dispatched::Events(n) => debug!("dispatched {n} events"),
            Dispatched::TimedOut => {}
        }
    }
    server.close();
    Ok(())
}

fn register_logging(server: &mut DisplayServer, quit: &Rc<Cell<bool>>) {
    let callbacks = server.callbacks_mut();
    callbacks.on_pointer_enter(|x, y| info!("pointer entered at {x:.1},{y:.1}"));
    callbacks.on_pointer_leave(|| info!("pointer left"));
    callbacks.on_pointer_motion(|_, x, y| debug!("pointer at {x:.1},{y:.1}"));
    callbacks.on_button_down(|_, button| info!("button {button:#x} down"));
    callbacks.on_button_up(|_, button| info!("button {button:#x} up"));
    callbacks.on_scroll(|_, axis, value| debug!("scroll {} by {value}", axis_name(axis)));
    callbacks.on_scroll_discrete(|axis, steps| info!("scroll {} {steps} steps", axis_name(axis)));
    callbacks.on_keyboard_enter(|| info!("keyboard focus gained"));
    callbacks.on_keyboard_leave(|| info!("keyboard focus lost"));
    callbacks.on_keymap(|keymap| debug!("received keymap of {} bytes", keymap.len()));
    let quit = Rc::clone(quit);
    callbacks.on_key_down(move |key| {
        info!("key {key} down");
        if key == KEY_ESC {
            quit.set(true);
        }
    });
    callbacks.on_key_up(|key| info!("key {key} up"));
    callbacks.on_repeat_info(|rate, delay| debug!("key repeat {rate}/s after {delay}ms"));
    callbacks.on_modifiers(|depressed, latched, locked| {
        debug!(depressed, latched, locked, "modifiers changed");
    });
}

fn axis_name(axis: ScrollAxis) -> &'static str {
    match axis {
        ScrollAxis::Vertical => "vertically",
        ScrollAxis::Horizontal => "horizontally",
    }
}
