use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::models::stream::StreamId;

use crate::library::NativeBindings;
use crate::runtime::LibraryRuntime;
use crate::stream::wrap_handle;

/// Native connection pool shared by rooms.
#[derive(Debug)]
pub struct ConnectionPool {
    handle: NativeHandle,
}

impl ConnectionPool {
    pub fn new(runtime: &LibraryRuntime) -> Result<Arc<Self>, RuntimeError> {
        let library = runtime.library()?;
        let create = library.bindings().api().connection_pool_create;
        let mut raw: *mut c_void = ptr::null_mut();
        library.invoke("vx_connection_pool_create", |library_ptr| unsafe {
            create(library_ptr, &mut raw)
        })?;
        let handle = wrap_handle(
            library.bindings(),
            HandleKind::ConnectionPool,
            "vx_connection_pool_create",
            raw,
        )?;
        Ok(Arc::new(Self { handle }))
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    /// Free the native pool. Idempotent; also runs when the last room lets go of it.
    pub fn dispose(&self) -> bool {
        self.handle.release()
    }
}

/// A native room: datagrams in and out of the network session.
///
/// Holds its connection pool alive for as long as it exists.
#[derive(Debug)]
pub struct Room {
    id: StreamId,
    handle: NativeHandle,
    bindings: Arc<NativeBindings>,
    // Dropped after `handle`, so the room is freed before its pool.
    pool: Arc<ConnectionPool>,
}

impl Room {
    pub fn new(runtime: &LibraryRuntime, pool: Arc<ConnectionPool>) -> Result<Self, RuntimeError> {
        let library = runtime.library()?;
        let library_ptr = library.as_raw();
        let bindings = Arc::clone(library.bindings());
        let create = bindings.api().room_create;
        let mut raw: *mut c_void = ptr::null_mut();
        // A live pool implies a live library.
        bindings.invoke("vx_room_create", &pool.handle, |pool_ptr| unsafe {
            create(library_ptr, pool_ptr, &mut raw)
        })?;
        let handle = wrap_handle(&bindings, HandleKind::Room, "vx_room_create", raw)?;

        let id = StreamId::new();
        log::info!("Created room {}", id);
        Ok(Self {
            id,
            handle,
            bindings,
            pool,
        })
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    pub fn push_datagram(&self, datagram: &[u8]) -> Result<(), RuntimeError> {
        let push = self.bindings.api().room_push_datagram;
        self.bindings.invoke("vx_room_push_datagram", &self.handle, |raw| unsafe {
            push(raw, datagram.as_ptr(), datagram.len())
        })
    }

    /// Copy the next incoming datagram into `buffer`. `Err(NoData)` when none is waiting.
    pub fn pop_datagram(&self, buffer: &mut [u8]) -> Result<usize, RuntimeError> {
        let pop = self.bindings.api().room_pop_datagram;
        let mut written = 0usize;
        self.bindings.invoke("vx_room_pop_datagram", &self.handle, |raw| unsafe {
            pop(raw, buffer.as_mut_ptr(), buffer.len(), &mut written)
        })?;
        Ok(written.min(buffer.len()))
    }

    /// Free the native room. Idempotent; also runs on drop.
    pub fn dispose(&self) -> bool {
        let released = self.handle.release();
        if released {
            log::info!("Disposed room {}", self.id);
        }
        released
    }
}
