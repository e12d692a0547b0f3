//! A scripted compositor that speaks the wire protocol over a socket pair.
//! It announces a fixed set of globals, answers `wl_display.sync`, and sends
//! canned input events once the client asks for a pointer or keyboard.

use rustix::{
    cmsg_space,
    fd::{AsFd, BorrowedFd, OwnedFd},
    net::{sendmsg, SendAncillaryBuffer, SendAncillaryMessage, SendFlags},
};
use std::{
    collections::HashMap,
    io::{IoSlice, Read, Write},
    os::unix::net::UnixStream,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};
use wayfront::DisplayServer;

#[derive(Debug)]
pub enum Arg {
    Uint(u32),
    Int(i32),
    Fixed(f64),
    Str(&'static str),
    Array(Vec<u8>),
    /// The surface the client created last.
    Surface,
    /// Passed out of band with `SCM_RIGHTS`.
    Fd(OwnedFd),
}

#[derive(Debug)]
pub struct Event {
    pub opcode: u16,
    pub args: Vec<Arg>,
}

impl Event {
    pub fn new(opcode: u16, args: impl Into<Vec<Arg>>) -> Event {
        Event {
            opcode,
            args: args.into(),
        }
    }
}

/// A memfd holding `bytes`, the way compositors hand out keymaps.
pub fn memfd_with(bytes: &[u8]) -> OwnedFd {
    let memfd = memfd::MemfdOptions::new().create("fake-keymap").unwrap();
    memfd.as_file().write_all(bytes).unwrap();
    OwnedFd::from(memfd.into_file())
}

pub struct Script {
    pub globals: Vec<(&'static str, u32)>,
    pub capabilities: u32,
    pub pointer_events: Vec<Event>,
    pub keyboard_events: Vec<Event>,
    pub ping: Option<u32>,
    /// Raw `wl_shm.format` codes announced on bind.
    pub shm_formats: Vec<u32>,
}

impl Script {
    /// Every global a desktop compositor offers, at versions above what the
    /// client binds.
    pub fn desktop() -> Script {
        Script {
            globals: vec![
                ("wl_shm", 1),
                ("wl_compositor", 6),
                ("wl_subcompositor", 1),
                ("wl_output", 4),
                ("xdg_wm_base", 5),
                ("wl_seat", 9),
            ],
            capabilities: 0,
            pointer_events: Vec::new(),
            keyboard_events: Vec::new(),
            ping: None,
            shm_formats: Vec::new(),
        }
    }

    pub fn without(mut self, interface: &str) -> Script {
        self.globals.retain(|&(name, _)| name != interface);
        self
    }
}

/// A request the client sent, with its arguments as raw words.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub interface: String,
    pub opcode: u16,
    pub args: Vec<u32>,
    /// Interface and version for `wl_registry.bind`.
    pub bound: Option<(String, u32)>,
}

impl Request {
    pub fn is(&self, interface: &str, opcode: u16) -> bool {
        self.interface == interface && self.opcode == opcode
    }
}

pub struct FakeCompositor {
    requests: Receiver<Request>,
    thread: Option<JoinHandle<()>>,
}

impl FakeCompositor {
    pub fn start(script: Script) -> (DisplayServer, FakeCompositor) {
        let (client, server) = UnixStream::pair().unwrap();
        let (tx, rx) = mpsc::channel();
        let thread = thread::spawn(move || serve(server, script, tx));
        let display = DisplayServer::from_stream(client).unwrap();
        (
            display,
            FakeCompositor {
                requests: rx,
                thread: Some(thread),
            },
        )
    }

    /// Requests handled so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.try_iter().collect()
    }

    /// Waits for the client to hang up and returns what it sent since the
    /// last call to `requests`.
    pub fn finish(mut self) -> Vec<Request> {
        let mut requests = Vec::new();
        loop {
            match self.requests.recv_timeout(Duration::from_secs(5)) {
                Ok(request) => requests.push(request),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => panic!("client never disconnected"),
            }
        }
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
        requests
    }
}

/// A serialized event and the descriptors that travel with it.
struct Outgoing<'a> {
    bytes: Vec<u8>,
    fds: Vec<BorrowedFd<'a>>,
}

fn encode<'a>(id: u32, event: &'a Event, surface: Option<u32>) -> Outgoing<'a> {
    let mut body = Vec::new();
    let mut fds = Vec::new();
    let pad = |body: &mut Vec<u8>| {
        while body.len() % 4 != 0 {
            body.push(0);
        }
    };
    for arg in &event.args {
        match arg {
            Arg::Uint(v) => body.extend(v.to_ne_bytes()),
            Arg::Int(v) => body.extend(v.to_ne_bytes()),
            Arg::Fixed(v) => body.extend(((v * 256.0).round() as i32).to_ne_bytes()),
            Arg::Str(s) => {
                body.extend((s.len() as u32 + 1).to_ne_bytes());
                body.extend(s.as_bytes());
                body.push(0);
                pad(&mut body);
            }
            Arg::Array(bytes) => {
                body.extend((bytes.len() as u32).to_ne_bytes());
                body.extend(bytes);
                pad(&mut body);
            }
            Arg::Surface => {
                let surface = surface.expect("event refers to a surface before one exists");
                body.extend(surface.to_ne_bytes());
            }
            Arg::Fd(fd) => fds.push(fd.as_fd()),
        }
    }
    let size = (8 + body.len()) as u32;
    let mut bytes = Vec::with_capacity(size as usize);
    bytes.extend(id.to_ne_bytes());
    bytes.extend((size << 16 | u32::from(event.opcode)).to_ne_bytes());
    bytes.extend(body);
    Outgoing { bytes, fds }
}

fn send(stream: &mut UnixStream, outgoing: &Outgoing<'_>) -> std::io::Result<()> {
    if outgoing.fds.is_empty() {
        return stream.write_all(&outgoing.bytes);
    }
    let mut cmsg_data = vec![0; cmsg_space!(ScmRights(outgoing.fds.len()))];
    let mut ctl = SendAncillaryBuffer::new(&mut cmsg_data);
    ctl.push(SendAncillaryMessage::ScmRights(&outgoing.fds));
    let n = sendmsg(
        &*stream,
        &[IoSlice::new(&outgoing.bytes)],
        &mut ctl,
        SendFlags::NOSIGNAL,
    )?;
    stream.write_all(&outgoing.bytes[n..])
}

fn words(body: &[u8]) -> Vec<u32> {
    body.chunks_exact(4)
        .map(|word| u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
        .collect()
}

/// Splits `wl_registry.bind` into the interface, version and new id.
fn parse_bind(body: &[u8]) -> (String, u32, u32) {
    let args = words(body);
    let len = args[1] as usize;
    let padded = (len + 3) / 4;
    let interface = String::from_utf8(body[8..8 + len - 1].to_vec()).unwrap();
    (interface, args[2 + padded], args[3 + padded])
}

fn serve(mut stream: UnixStream, script: Script, log: Sender<Request>) {
    let mut objects = HashMap::from([(1u32, String::from("wl_display"))]);
    let mut serial = 0;
    let mut surface = None;
    loop {
        let mut header = [0u8; 8];
        if stream.read_exact(&mut header).is_err() {
            return;
        }
        let header = words(&header);
        let (id, size, opcode) = (header[0], header[1] >> 16, (header[1] & 0xffff) as u16);
        let mut body = vec![0u8; (size as usize).saturating_sub(8)];
        if stream.read_exact(&mut body).is_err() {
            return;
        }
        let args = words(&body);
        let interface = objects.get(&id).cloned().unwrap_or_default();
        let bind = (interface == "wl_registry" && opcode == 0).then(|| parse_bind(&body));
        let _ = log.send(Request {
            interface: interface.clone(),
            opcode,
            args: args.clone(),
            bound: bind
                .as_ref()
                .map(|(bound, version, _)| (bound.clone(), *version)),
        });

        // The client may already be gone during teardown, so write errors
        // are ignored.
        let mut reply = |id: u32, event: &Event, surface: Option<u32>| {
            let _ = send(&mut stream, &encode(id, event, surface));
        };
        match (interface.as_str(), opcode) {
            ("wl_display", 0) => {
                serial += 1;
                reply(args[0], &Event::new(0, [Arg::Uint(serial)]), None);
                reply(1, &Event::new(1, [Arg::Uint(args[0])]), None);
            }
            ("wl_display", 1) => {
                objects.insert(args[0], String::from("wl_registry"));
                for (name, &(global, version)) in (1u32..).zip(&script.globals) {
                    let event = Event::new(
                        0,
                        [Arg::Uint(name), Arg::Str(global), Arg::Uint(version)],
                    );
                    reply(args[0], &event, None);
                }
            }
            ("wl_registry", 0) => {
                let Some((bound, _, new_id)) = bind else {
                    continue;
                };
                match bound.as_str() {
                    "wl_seat" => {
                        let event = Event::new(0, [Arg::Uint(script.capabilities)]);
                        reply(new_id, &event, None);
                    }
                    "wl_shm" => {
                        for &format in &script.shm_formats {
                            reply(new_id, &Event::new(0, [Arg::Uint(format)]), None);
                        }
                    }
                    "xdg_wm_base" => {
                        if let Some(ping) = script.ping {
                            reply(new_id, &Event::new(0, [Arg::Uint(ping)]), None);
                        }
                    }
                    _ => {}
                }
                objects.insert(new_id, bound);
            }
            ("wl_compositor", 0) => {
                objects.insert(args[0], String::from("wl_surface"));
                surface = Some(args[0]);
            }
            ("wl_seat", 0) => {
                objects.insert(args[0], String::from("wl_pointer"));
                for event in &script.pointer_events {
                    reply(args[0], event, surface);
                }
            }
            ("wl_seat", 1) => {
                objects.insert(args[0], String::from("wl_keyboard"));
                for event in &script.keyboard_events {
                    reply(args[0], event, surface);
                }
            }
            ("wl_shm", 0) => {
                objects.insert(args[0], String::from("wl_shm_pool"));
            }
            ("wl_shm_pool", 0) => {
                objects.insert(args[0], String::from("wl_buffer"));
            }
            _ => {}
        }
    }
}
