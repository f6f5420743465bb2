//! # voice-runtime-core
//!
//! Platform-agnostic core of the voice runtime.
//!
//! Provides the native handle lifecycle, the managed mirror of native effect
//! pipelines, the capture ring buffer and configuration. The native backend
//! (`voice-runtime-native`) loads the C ABI library and plugs into the
//! `HandleRelease` and `PipelineBackend` traits.
//!
//! ## Architecture
//!
//! ```text
//! voice-runtime-core (this crate)
//! ├── traits/       ← HandleRelease, PipelineBackend, CustomEffect, CaptureSource
//! ├── models/       ← RuntimeError, HandleKind/HandleState/RuntimeState, configuration, effects
//! ├── handle/       ← NativeHandle (single-release ownership of native pointers)
//! ├── pipeline/     ← EffectPipeline (native-authoritative ordering)
//! └── processing/   ← CaptureRingBuffer, CircularSampleBuffer
//! ```

pub mod handle;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use handle::native_handle::NativeHandle;
pub use models::config::{CapturePyramidConfig, RuntimeConfiguration, StreamConfiguration};
pub use models::effect::{
    ApmConfig, CustomEffectSlot, EffectCategory, EffectId, EffectKind, NoiseSuppressionLevel, VadConfig,
};
pub use models::error::RuntimeError;
pub use models::state::{HandleKind, HandleState, RuntimeState};
pub use models::stream::{DrainOutcome, StreamId};
pub use pipeline::effect_pipeline::{EffectPipeline, PipelineEffect};
pub use processing::capture_ring::CaptureRingBuffer;
pub use processing::circular_buffer::CircularSampleBuffer;
pub use traits::capture_source::CaptureSource;
pub use traits::custom_effect::{AsAny, CustomEffect};
pub use traits::handle_release::HandleRelease;
pub use traits::pipeline_backend::PipelineBackend;
