//! # voice-runtime-native
//!
//! Native backend for voice-runtime-core: binds the closed-source `voxengine`
//! C ABI library at runtime and exposes its objects as owned Rust types.
//!
//! Provides:
//! - `PlatformLoader`: Resolves and opens the platform's `voxengine` binary
//! - `LibraryRuntime`: Process-wide, lazily initialized library lifecycle
//! - `Encoder` / `Decoder`: Voice streams with native effect pipelines
//! - `Room` / `ConnectionPool`, `Cipher`, `TokenGenerator`: Remaining native objects
//! - `MicrophoneCapture` / `PlaybackBuffer`: Engine audio tick bridges
//!
//! ## Usage
//! ```ignore
//! use voice_runtime_native::{Encoder, LibraryRuntime};
//! use voice_runtime_core::{ApmConfig, EffectKind, StreamConfiguration};
//!
//! let runtime = LibraryRuntime::global();
//! // Released at exit on Unix; required elsewhere.
//! let _shutdown = runtime.shutdown_guard();
//! let mut encoder = Encoder::new(runtime, StreamConfiguration::default())?;
//! encoder.pipeline_mut().insert(EffectKind::Apm(ApmConfig::default()), 0)?;
//! encoder.push_samples(&frame)?;
//! ```

pub mod capture;
pub mod ffi;
pub mod library;
pub mod loader;
pub mod pipeline;
pub mod platform;
pub mod runtime;
pub mod stream;

#[cfg(test)]
mod fake_native;

pub use capture::{MicrophoneCapture, PlaybackBuffer};
pub use ffi::NativeApi;
pub use library::{Library, NativeBindings};
pub use loader::{LoadedBinary, PlatformLoader};
pub use pipeline::NativePipeline;
pub use platform::Platform;
pub use runtime::{Binder, LibraryRuntime, ShutdownGuard};
pub use stream::cipher::Cipher;
pub use stream::decoder::Decoder;
pub use stream::encoder::Encoder;
pub use stream::room::{ConnectionPool, Room};
pub use stream::token::TokenGenerator;
