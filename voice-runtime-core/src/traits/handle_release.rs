use std::ffi::c_void;
use std::ptr::NonNull;

use crate::models::error::RuntimeError;
use crate::models::state::HandleKind;

/// Releases native objects on behalf of [`NativeHandle`](crate::NativeHandle).
///
/// Implemented by whatever owns the native function table. A handle calls
/// `release` at most once, and only while `owner_alive` reports true.
pub trait HandleRelease: Send + Sync {
    /// Whether the owning library is still initialized. Once false, native
    /// free functions must not be called.
    fn owner_alive(&self) -> bool;

    /// Call the matching native `*_free`/`*_destroy` function.
    ///
    /// `initialized` tells the releaser whether the object completed its
    /// native initialization step, so partially-built objects can be freed
    /// without their shutdown call.
    fn release(
        &self,
        kind: HandleKind,
        raw: NonNull<c_void>,
        initialized: bool,
    ) -> Result<(), RuntimeError>;
}
