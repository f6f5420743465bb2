use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::RuntimeError;
use crate::models::state::{HandleKind, HandleState};
use crate::traits::handle_release::HandleRelease;

/// Opaque native pointer.
#[derive(Debug, Clone, Copy)]
struct RawPtr(NonNull<c_void>);

// SAFETY: the pointer is never dereferenced on the Rust side; it is only passed
// back to the native library, which owns the pointee and its synchronization.
unsafe impl Send for RawPtr {}
unsafe impl Sync for RawPtr {}

/// Exclusive owner of one opaque native pointer.
///
/// Guarantees the native object is released at most once: explicitly via
/// [`release`](Self::release), or on drop. Every native call must go through
/// [`checked_ptr`](Self::checked_ptr), which refuses to hand out the pointer
/// once the handle is not alive.
pub struct NativeHandle {
    kind: HandleKind,
    raw: RawPtr,
    state: Mutex<HandleState>,
    releaser: Arc<dyn HandleRelease>,
}

impl NativeHandle {
    /// Wrap a pointer returned by a native `*_create` call.
    ///
    /// Returns `None` for a null pointer. Kinds that need no native
    /// initialization start out alive; the rest start `Uninitialized`.
    pub fn from_raw(
        kind: HandleKind,
        raw: *mut c_void,
        releaser: Arc<dyn HandleRelease>,
    ) -> Option<Self> {
        let raw = NonNull::new(raw)?;
        let state = if kind.requires_initialization() {
            HandleState::Uninitialized
        } else {
            HandleState::Alive
        };
        Some(Self {
            kind,
            raw: RawPtr(raw),
            state: Mutex::new(state),
            releaser,
        })
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn state(&self) -> HandleState {
        *self.state.lock()
    }

    /// Record that the native initialization step succeeded.
    ///
    /// Returns false if the handle was already released or invalidated.
    pub fn mark_initialized(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            HandleState::Uninitialized | HandleState::Alive => {
                *state = HandleState::Alive;
                true
            }
            HandleState::Released | HandleState::Invalid => false,
        }
    }

    /// Alive = initialized, not released, not invalidated, and the owning
    /// library is still initialized.
    pub fn is_alive(&self) -> bool {
        self.state.lock().is_alive() && self.releaser.owner_alive()
    }

    /// The raw pointer, for native calls.
    ///
    /// Using a handle that is not alive is a programming error: it panics in
    /// debug builds and logs a warning and returns `HandleNotAlive` otherwise.
    #[track_caller]
    pub fn checked_ptr(&self) -> Result<*mut c_void, RuntimeError> {
        if self.is_alive() {
            return Ok(self.raw.0.as_ptr());
        }
        let state = self.state();
        debug_assert!(
            false,
            "{} handle used while not alive (state: {:?})",
            self.kind, state
        );
        log::warn!(
            "{} handle used while not alive (state: {:?}), ignoring call",
            self.kind,
            state
        );
        Err(RuntimeError::HandleNotAlive { kind: self.kind })
    }

    /// The raw pointer regardless of state, for diagnostics and identity
    /// comparisons only.
    pub fn as_raw(&self) -> *mut c_void {
        self.raw.0.as_ptr()
    }

    /// Release the native object. Idempotent.
    ///
    /// On the first call, invokes the native free function if the owning
    /// library is still initialized, then marks the handle released whether or
    /// not that call succeeded. Returns true only for the call that released.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        let initialized = state.is_alive();

        if self.releaser.owner_alive() {
            let releaser = &self.releaser;
            let (kind, raw) = (self.kind, self.raw.0);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                releaser.release(kind, raw, initialized)
            }));
            match outcome {
                Ok(Ok(())) => log::debug!("Released {} handle {:p}", self.kind, raw),
                Ok(Err(e)) => log::warn!("Failed to release {} handle: {}", self.kind, e),
                Err(_) => log::error!("Panic while releasing {} handle", self.kind),
            }
        } else {
            log::debug!(
                "Owner of {} handle already shut down, skipping native free",
                self.kind
            );
        }

        *state = HandleState::Released;
        true
    }

    /// Mark the handle unusable without calling into the native library.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = HandleState::Invalid;
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("raw", &self.raw.0)
            .field("state", &self.state())
            .finish()
    }
}
