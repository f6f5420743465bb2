//! Caller-facing objects backed by native handles.

pub mod cipher;
pub mod decoder;
pub mod encoder;
pub mod room;
pub mod token;

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::config::StreamConfiguration;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::models::stream::StreamId;
use voice_runtime_core::pipeline::effect_pipeline::EffectPipeline;

use crate::ffi::{CreateStreamFn, NativeApi, VxStatus, VX_OK};
use crate::library::NativeBindings;
use crate::pipeline::NativePipeline;
use crate::runtime::LibraryRuntime;

/// Wrap the out-pointer of a successful native `*_create` call.
///
/// Kinds with a native init step are marked initialized only once the object
/// is known to be non-null.
pub(crate) fn wrap_handle(
    bindings: &Arc<NativeBindings>,
    kind: HandleKind,
    call: &'static str,
    raw: *mut c_void,
) -> Result<NativeHandle, RuntimeError> {
    let releaser = Arc::clone(bindings);
    let handle = NativeHandle::from_raw(kind, raw, releaser)
        .ok_or_else(|| RuntimeError::native(call, VX_OK, "native call returned a null object"))?;
    if kind.requires_initialization() {
        handle.mark_initialized();
    }
    Ok(handle)
}

/// Shared body of [`Encoder`](encoder::Encoder) and [`Decoder`](decoder::Decoder):
/// a stream handle with its effect pipeline.
///
/// Disposal removes every effect, frees the pipeline, then frees the stream.
#[derive(Debug)]
pub(crate) struct MediaStream {
    id: StreamId,
    kind: HandleKind,
    config: StreamConfiguration,
    pipeline: EffectPipeline<NativePipeline>,
    handle: NativeHandle,
    bindings: Arc<NativeBindings>,
}

impl MediaStream {
    pub(crate) fn open(
        runtime: &LibraryRuntime,
        kind: HandleKind,
        call: &'static str,
        create: fn(&NativeApi) -> CreateStreamFn,
        config: StreamConfiguration,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let library = runtime.library()?;
        let bindings = Arc::clone(library.bindings());

        let create = create(bindings.api());
        let mut raw: *mut c_void = ptr::null_mut();
        library.invoke(call, |library_ptr| unsafe {
            create(library_ptr, config.sample_rate, config.channels, &mut raw)
        })?;
        let handle = wrap_handle(&bindings, kind, call, raw)?;
        let pipeline = NativePipeline::create(&bindings, &handle)?;

        let id = StreamId::new();
        log::info!(
            "Created {} {} ({} Hz, {} ch)",
            kind,
            id,
            config.sample_rate,
            config.channels
        );
        Ok(Self {
            id,
            kind,
            config,
            pipeline: EffectPipeline::new(pipeline),
            handle,
            bindings,
        })
    }

    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    pub(crate) fn config(&self) -> StreamConfiguration {
        self.config
    }

    pub(crate) fn pipeline(&self) -> &EffectPipeline<NativePipeline> {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut EffectPipeline<NativePipeline> {
        &mut self.pipeline
    }

    pub(crate) fn api(&self) -> &NativeApi {
        self.bindings.api()
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    #[track_caller]
    pub(crate) fn invoke<F>(&self, call: &'static str, native: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(*mut c_void) -> VxStatus,
    {
        self.bindings.invoke(call, &self.handle, native)
    }

    /// Returns false if already disposed.
    pub(crate) fn dispose(&mut self) -> bool {
        if self.handle.state().is_terminal() {
            return false;
        }
        self.pipeline.dispose();
        self.pipeline.backend().release();
        self.handle.release();
        log::info!("Disposed {} {}", self.kind, self.id);
        true
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.dispose();
    }
}
