use crate::{
    display::State,
    error::{Error, ErrorKind, Result},
};
use memmap2::{MmapMut, MmapOptions};
use std::os::fd::AsFd;
use tracing::trace;
use wayland_client::{
    protocol::{
        wl_buffer::{self, WlBuffer},
        wl_registry::WlRegistry,
        wl_shm::{self, Format, WlShm},
        wl_shm_pool::{self, WlShmPool},
    },
    Connection, Dispatch, Proxy, QueueHandle, WEnum,
};

/// Version 2 only adds a destructor.
pub(crate) const SHM_VERSION: u32 = 1;

/// The compositor's shared memory global plus the pixel formats it accepts.
pub struct Shm {
    wl_shm: WlShm,
    formats: Vec<Format>,
}

/// A memfd of a fixed size, mapped read-write.
pub struct SharedMemory {
    memfd: memfd::Memfd,
    mmap: MmapMut,
}

/// A buffer filled with one colour, kept alive together with its backing
/// memory.
pub struct SolidBuffer {
    buffer: WlBuffer,
    memory: SharedMemory,
}

impl Shm {
    pub(crate) fn bind(
        registry: &WlRegistry,
        name: u32,
        version: u32,
        qhandle: &QueueHandle<State>,
    ) -> Shm {
        Shm {
            wl_shm: registry.bind(name, version.min(SHM_VERSION), qhandle, ()),
            formats: Vec::new(),
        }
    }

    pub(crate) fn unbind(self) {
        // Dropping the proxy is all a version 1 wl_shm allows.
        trace!("releasing wl_shm with {} known formats", self.formats.len());
    }

    pub fn wl_shm(&self) -> &WlShm {
        &self.wl_shm
    }

    /// Whether the compositor announced `format`. `Argb8888` and `Xrgb8888`
    /// are always supported. Buffers are 32 bits per pixel whatever the
    /// format says.
    pub fn supports(&self, format: Format) -> bool {
        matches!(format, Format::Argb8888 | Format::Xrgb8888) || self.formats.contains(&format)
    }

    pub fn create_solid_buffer(
        &self,
        qhandle: &QueueHandle<State>,
        width: u32,
        height: u32,
        format: Format,
        color: u32,
    ) -> Result<SolidBuffer> {
        if !self.supports(format) {
            return Err(Error::new(ErrorKind::UnsupportedFormat(format)));
        }
        let layout = BufferLayout::new(width, height)?;
        let mut memory = SharedMemory::new(layout.len as usize)?;
        fill_solid(memory.bytes_mut(), color)?;
        let pool = self
            .wl_shm
            .create_pool(memory.memfd.as_file().as_fd(), layout.len, qhandle, ());
        let buffer = pool.create_buffer(
            0,
            layout.width,
            layout.height,
            layout.stride,
            format,
            qhandle,
            (),
        );
        // The buffer keeps the pool's memory alive on the compositor side.
        pool.destroy();
        Ok(SolidBuffer { buffer, memory })
    }
}

impl SharedMemory {
    pub fn new(len: usize) -> Result<SharedMemory> {
        let memfd = memfd::MemfdOptions::new()
            .create("wayfront-buffer")
            .map_err(|err| Error::with_source(ErrorKind::ShmOpenFailure, err))?;
        memfd
            .as_file()
            .set_len(len as u64)
            .map_err(|err| Error::with_source(ErrorKind::ShmOpenFailure, err))?;
        let mmap = unsafe { MmapOptions::new().len(len).map_mut(memfd.as_file()) }
            .map_err(|err| Error::with_source(ErrorKind::MmapFailure, err))?;
        Ok(SharedMemory { memfd, mmap })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl SolidBuffer {
    pub fn wl_buffer(&self) -> &WlBuffer {
        &self.buffer
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn destroy(self) {
        self.buffer.destroy();
    }
}

/// Dimensions of a 32 bits per pixel buffer as the protocol wants them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BufferLayout {
    width: i32,
    height: i32,
    stride: i32,
    len: i32,
}

impl BufferLayout {
    fn new(width: u32, height: u32) -> Result<BufferLayout> {
        let invalid = || Error::new(ErrorKind::InvalidBufferSize { width, height });
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        let stride = width.checked_mul(4).ok_or_else(invalid)?;
        let len = stride.checked_mul(height).ok_or_else(invalid)?;
        Ok(BufferLayout {
            width: i32::try_from(width).map_err(|_| invalid())?,
            height: i32::try_from(height).map_err(|_| invalid())?,
            stride: i32::try_from(stride).map_err(|_| invalid())?,
            len: i32::try_from(len).map_err(|_| invalid())?,
        })
    }
}

fn fill_solid(bytes: &mut [u8], color: u32) -> Result<()> {
    let pixels: &mut [u32] = bytemuck::try_cast_slice_mut(bytes)
        .map_err(|_| Error::new(ErrorKind::MmapFailure))?;
    pixels.fill(color);
    Ok(())
}

impl Dispatch<WlShm, ()> for State {
    fn event(
        state: &mut Self,
        _proxy: &WlShm,
        event: wl_shm::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_shm::Event;
        match event {
            Event::Format {
                format: WEnum::Value(format),
            } => {
                if let Some(shm) = state.globals.shm.as_mut() {
                    trace!("compositor supports {format:?}");
                    shm.formats.push(format);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlShmPool, ()> for State {
    fn event(
        _state: &mut Self,
        _proxy: &WlShmPool,
        event: wl_shm_pool::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        match event {
            _ => {}
        }
    }
}

impl Dispatch<WlBuffer, ()> for State {
    fn event(
        _state: &mut Self,
        proxy: &WlBuffer,
        event: wl_buffer::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_buffer::Event;
        match event {
            Event::Release => trace!("compositor released {}", proxy.id()),
            _ => {}
        }
    }
}
