//! Process-wide library runtime.
//!
//! Lazily loads and initializes the native library on first use. Callers
//! that find it initialized take a shared read lock only; the first caller
//! to find it missing holds the single upgradable lock, so concurrent
//! callers block behind one initializer instead of racing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use voice_runtime_core::models::config::RuntimeConfiguration;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::RuntimeState;

use crate::library::{Library, NativeBindings};
use crate::loader::PlatformLoader;

/// Produces the function table for a configuration.
pub type Binder = fn(&RuntimeConfiguration) -> Result<NativeBindings, RuntimeError>;

/// Load the platform binary for `config` and resolve its function table.
pub fn load_platform_bindings(config: &RuntimeConfiguration) -> Result<NativeBindings, RuntimeError> {
    let binary = PlatformLoader::current().load_configured(config)?;
    NativeBindings::from_binary(binary)
}

struct Slot {
    state: RuntimeState,
    library: Option<Arc<Library>>,
    /// Used by lazy initialization; defaults when never configured.
    config: Option<RuntimeConfiguration>,
}

/// Owner of the native library instance.
pub struct LibraryRuntime {
    binder: Binder,
    slot: RwLock<Slot>,
    ready: AtomicBool,
}

static GLOBAL: OnceLock<LibraryRuntime> = OnceLock::new();

impl LibraryRuntime {
    /// An independent runtime. Most callers want [`global`](Self::global).
    pub fn new(binder: Binder) -> Self {
        Self {
            binder,
            slot: RwLock::new(Slot {
                state: RuntimeState::Uninitialized,
                library: None,
                config: None,
            }),
            ready: AtomicBool::new(false),
        }
    }

    /// The process-wide runtime, backed by the platform loader.
    ///
    /// On Unix its library is released when the process exits normally.
    /// Elsewhere hold a [`shutdown_guard`](Self::shutdown_guard) in `main`.
    pub fn global() -> &'static LibraryRuntime {
        GLOBAL.get_or_init(|| {
            if !exit_hook::install() {
                log::warn!("No exit hook for the global library runtime; hold a shutdown guard");
            }
            Self::new(load_platform_bindings)
        })
    }

    pub fn state(&self) -> RuntimeState {
        self.slot.read().state
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Set the configuration lazy initialization will use.
    ///
    /// Takes effect at the next initialization; a running library is untouched.
    pub fn configure(&self, config: RuntimeConfiguration) -> Result<(), RuntimeError> {
        config.validate()?;
        self.slot.write().config = Some(config);
        Ok(())
    }

    /// Explicitly initialize with `config`.
    ///
    /// Fails with `AlreadyInitialized` while a library is held; after
    /// [`release`](Self::release) a fresh library is built.
    pub fn initialize(&self, config: RuntimeConfiguration) -> Result<Arc<Library>, RuntimeError> {
        config.validate()?;
        let mut slot = self.slot.write();
        if slot.library.is_some() {
            return Err(RuntimeError::AlreadyInitialized);
        }
        self.initialize_locked(&mut slot, config)
    }

    /// The initialized library, initializing it on first use.
    pub fn library(&self) -> Result<Arc<Library>, RuntimeError> {
        if self.ready.load(Ordering::Acquire) {
            if let Some(library) = &self.slot.read().library {
                return Ok(Arc::clone(library));
            }
        }

        let slot = self.slot.upgradable_read();
        if let Some(library) = &slot.library {
            return Ok(Arc::clone(library));
        }
        let mut slot = RwLockUpgradableReadGuard::upgrade(slot);
        let config = slot.config.clone().unwrap_or_default();
        self.initialize_locked(&mut slot, config)
    }

    /// Shut down and free the native library. Returns false if none was held.
    ///
    /// Objects created from the released library stay safe to drop; their
    /// native frees are skipped.
    pub fn release(&self) -> bool {
        let mut slot = self.slot.write();
        self.ready.store(false, Ordering::Release);
        let Some(library) = slot.library.take() else {
            return false;
        };
        library.release();
        slot.state = RuntimeState::Released;
        log::info!("Library runtime released");
        true
    }

    /// Where the current library was loaded from.
    pub fn location(&self) -> Option<PathBuf> {
        self.slot
            .read()
            .library
            .as_ref()
            .map(|library| library.location().to_path_buf())
    }

    /// Guard that releases this runtime when dropped. Hold it in `main`.
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard { runtime: self }
    }

    fn initialize_locked(&self, slot: &mut Slot, config: RuntimeConfiguration) -> Result<Arc<Library>, RuntimeError> {
        slot.state = RuntimeState::Initializing;
        log::info!("Initializing library runtime ({})", config.library_name);

        let result = (self.binder)(&config).and_then(|bindings| Library::initialize(bindings, config.api_version));
        match result {
            Ok(library) => {
                let library = Arc::new(library);
                slot.library = Some(Arc::clone(&library));
                slot.config = Some(config);
                slot.state = RuntimeState::Initialized;
                self.ready.store(true, Ordering::Release);
                Ok(library)
            }
            Err(e) => {
                slot.state = RuntimeState::Uninitialized;
                log::error!("Library runtime initialization failed: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for LibraryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryRuntime")
            .field("state", &self.state())
            .field("location", &self.location())
            .finish()
    }
}

/// Releases the runtime once, when dropped.
///
/// Required for [`LibraryRuntime::global`] on platforms without an exit
/// hook, and for any runtime built with [`LibraryRuntime::new`].
#[must_use = "the runtime is released when the guard is dropped"]
pub struct ShutdownGuard<'a> {
    runtime: &'a LibraryRuntime,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        if self.runtime.release() {
            log::info!("Library runtime released at shutdown");
        }
    }
}

#[cfg(unix)]
mod exit_hook {
    use std::panic::{self, AssertUnwindSafe};

    use super::GLOBAL;

    extern "C" fn release_global() {
        let Some(runtime) = GLOBAL.get() else {
            return;
        };
        // Unwinding out of an atexit handler aborts the process.
        if panic::catch_unwind(AssertUnwindSafe(|| runtime.release())).is_err() {
            log::error!("Panic while releasing the library runtime at exit");
        }
    }

    pub(super) fn install() -> bool {
        // SAFETY: `release_global` never unwinds and only reads a static.
        unsafe { libc::atexit(release_global) == 0 }
    }
}

#[cfg(not(unix))]
mod exit_hook {
    pub(super) fn install() -> bool {
        false
    }
}
