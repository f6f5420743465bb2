//! The loaded native library: function table, root handle, and the release
//! policy shared by every child handle.

use std::ffi::{c_void, CStr};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::traits::handle_release::HandleRelease;

use crate::ffi::{NativeApi, ObjectFn, VxStatus, VX_NO_DATA, VX_OK};
use crate::loader::LoadedBinary;

/// Resolved function table plus the binary it came from.
///
/// Child handles (encoders, rooms, ciphers, ...) hold an `Arc` to this as
/// their [`HandleRelease`]; it only calls `*_free` while the library is
/// initialized. The binary stays mapped until the last such `Arc` is gone.
///
/// Every call into a live library holds `live` for reading; shutdown takes it
/// for writing, so it waits out calls in flight and later calls see the
/// library as gone.
#[derive(Debug)]
pub struct NativeBindings {
    api: NativeApi,
    location: PathBuf,
    initialized: AtomicBool,
    live: RwLock<()>,
    // Declared last: unmapped only after every other field is gone.
    binary: Option<LoadedBinary>,
}

impl NativeBindings {
    /// Resolve the function table from a loaded binary.
    pub fn from_binary(binary: LoadedBinary) -> Result<Self, RuntimeError> {
        let api = NativeApi::resolve(&binary)?;
        Ok(Self {
            api,
            location: binary.location().to_path_buf(),
            initialized: AtomicBool::new(false),
            live: RwLock::new(()),
            binary: Some(binary),
        })
    }

    /// Use a table for an engine linked into the process some other way.
    pub fn from_api(api: NativeApi, location: PathBuf) -> Self {
        Self {
            api,
            location,
            initialized: AtomicBool::new(false),
            live: RwLock::new(()),
            binary: None,
        }
    }

    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether the native library is currently initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_dynamically_loaded(&self) -> bool {
        self.binary.is_some()
    }

    /// Last error message the native library recorded on this thread.
    pub fn last_error(&self) -> String {
        let message = unsafe { (self.api.get_last_error)() };
        if message.is_null() {
            return "no native error message".to_string();
        }
        // SAFETY: the library returns a NUL-terminated string that stays valid
        // until the next failing call on this thread; it is copied immediately.
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }

    /// Map a native status code to a result.
    pub fn check(&self, call: &'static str, status: VxStatus) -> Result<(), RuntimeError> {
        match status {
            VX_OK => Ok(()),
            VX_NO_DATA => Err(RuntimeError::NoData),
            code => Err(RuntimeError::native(call, code, self.last_error())),
        }
    }

    /// Run `native` on `handle`'s pointer with shutdown held off.
    ///
    /// Re-entrant on one thread, so a custom effect may call back into the
    /// library. Releasing the runtime from inside such a call deadlocks.
    #[track_caller]
    pub(crate) fn invoke<F>(&self, call: &'static str, handle: &NativeHandle, native: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(*mut c_void) -> VxStatus,
    {
        let _live = self.live.read_recursive();
        let raw = handle.checked_ptr()?;
        let status = native(raw);
        self.check(call, status)
    }

    fn free_fn(&self, kind: HandleKind) -> Option<(&'static str, ObjectFn)> {
        let api = &self.api;
        Some(match kind {
            HandleKind::Library => return None,
            HandleKind::Cipher => ("vx_cipher_free", api.cipher_free),
            HandleKind::ConnectionPool => ("vx_connection_pool_free", api.connection_pool_free),
            HandleKind::Encoder => ("vx_encoder_free", api.encoder_free),
            HandleKind::Decoder => ("vx_decoder_free", api.decoder_free),
            HandleKind::Pipeline => ("vx_pipeline_free", api.pipeline_free),
            HandleKind::Room => ("vx_room_free", api.room_free),
            HandleKind::TokenGenerator => ("vx_token_generator_free", api.token_generator_free),
        })
    }
}

impl HandleRelease for NativeBindings {
    fn owner_alive(&self) -> bool {
        self.is_initialized()
    }

    fn release(&self, kind: HandleKind, raw: NonNull<c_void>, _initialized: bool) -> Result<(), RuntimeError> {
        let Some((call, free)) = self.free_fn(kind) else {
            return Err(RuntimeError::native(
                "vx_library_free",
                -1,
                "library handles are released by the runtime",
            ));
        };
        let _live = self.live.read_recursive();
        // Shutdown may have won since the owner was last seen alive.
        if !self.is_initialized() {
            log::debug!("Library shut down before {} handle was freed, skipping", kind);
            return Ok(());
        }
        let status = unsafe { free(raw.as_ptr()) };
        self.check(call, status)
    }
}

/// Releases the root library handle: shutdown if it was initialized, then free.
///
/// Always reports its owner alive, so a partially built library is freed too.
struct LibraryReleaser {
    bindings: Arc<NativeBindings>,
}

impl HandleRelease for LibraryReleaser {
    fn owner_alive(&self) -> bool {
        true
    }

    fn release(&self, _kind: HandleKind, raw: NonNull<c_void>, initialized: bool) -> Result<(), RuntimeError> {
        let api = self.bindings.api();
        // Waits for calls in flight; children see the library as gone once it is held.
        let _live = self.bindings.live.write();
        let was_initialized = self.bindings.initialized.swap(false, Ordering::AcqRel);

        let shutdown = if initialized || was_initialized {
            let status = unsafe { (api.library_shutdown)(raw.as_ptr()) };
            self.bindings.check("vx_library_shutdown", status)
        } else {
            Ok(())
        };

        let status = unsafe { (api.library_free)(raw.as_ptr()) };
        let freed = self.bindings.check("vx_library_free", status);
        shutdown.and(freed)
    }
}

/// One initialized instance of the native library.
#[derive(Debug)]
pub struct Library {
    bindings: Arc<NativeBindings>,
    handle: NativeHandle,
    api_version: u32,
}

impl Library {
    /// Create and initialize the native library.
    ///
    /// On a failing `vx_library_initialize` the half-built library is freed
    /// and the native error text is returned.
    pub fn initialize(bindings: NativeBindings, api_version: u32) -> Result<Self, RuntimeError> {
        let bindings = Arc::new(bindings);
        let raw = unsafe { (bindings.api().library_create)() };
        let releaser = Arc::new(LibraryReleaser {
            bindings: Arc::clone(&bindings),
        });
        let handle = NativeHandle::from_raw(HandleKind::Library, raw, releaser).ok_or_else(|| {
            RuntimeError::NativeInitializationFailed {
                code: -1,
                message: bindings.last_error(),
            }
        })?;

        let status = unsafe { (bindings.api().library_initialize)(raw, api_version) };
        if status != VX_OK {
            let message = bindings.last_error();
            handle.release();
            return Err(RuntimeError::NativeInitializationFailed {
                code: status,
                message,
            });
        }

        handle.mark_initialized();
        bindings.initialized.store(true, Ordering::Release);
        log::info!(
            "Native library initialized (api version {}, {})",
            api_version,
            bindings.location().display()
        );

        Ok(Self {
            bindings,
            handle,
            api_version,
        })
    }

    pub fn bindings(&self) -> &Arc<NativeBindings> {
        &self.bindings
    }

    /// Where the binary was loaded from.
    pub fn location(&self) -> &Path {
        self.bindings.location()
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    pub fn last_error(&self) -> String {
        self.bindings.last_error()
    }

    /// Run a `*_create` style call on the library pointer with shutdown held off.
    ///
    /// The library handle itself is checked before the lock is taken; under
    /// the lock only the initialized flag is consulted, since a concurrent
    /// release holds the handle while it waits for the lock.
    #[track_caller]
    pub(crate) fn invoke<F>(&self, call: &'static str, native: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(*mut c_void) -> VxStatus,
    {
        let raw = self.handle.checked_ptr()?;
        let _live = self.bindings.live.read_recursive();
        if !self.bindings.is_initialized() {
            log::warn!("Native library shut down before {}, ignoring call", call);
            return Err(RuntimeError::HandleNotAlive {
                kind: HandleKind::Library,
            });
        }
        let status = native(raw);
        self.bindings.check(call, status)
    }

    /// Library pointer for calls that also go through a child's [`NativeBindings::invoke`].
    pub(crate) fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }

    /// Shut down and free the native library. Idempotent.
    ///
    /// Child handles still alive afterwards skip their native free.
    pub fn release(&self) -> bool {
        let released = self.handle.release();
        if released {
            log::info!("Native library released ({})", self.location().display());
        }
        released
    }
}
