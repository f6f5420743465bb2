//! [`PipelineBackend`] over a native `vx_pipeline_*` object.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::sync::Arc;

use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::effect::{EffectCategory, EffectId, EffectKind};
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::traits::custom_effect::CustomEffect;
use voice_runtime_core::traits::pipeline_backend::PipelineBackend;

use crate::ffi::{VxApmConfig, VxVadConfig};
use crate::library::NativeBindings;
use crate::stream::wrap_handle;

/// Native effect pipeline attached to one encoder or decoder.
#[derive(Debug)]
pub struct NativePipeline {
    handle: NativeHandle,
    bindings: Arc<NativeBindings>,
}

impl NativePipeline {
    /// Create the pipeline for `stream`.
    pub(crate) fn create(bindings: &Arc<NativeBindings>, stream: &NativeHandle) -> Result<Self, RuntimeError> {
        let create = bindings.api().pipeline_create;
        let mut raw: *mut c_void = ptr::null_mut();
        bindings.invoke("vx_pipeline_create", stream, |stream_ptr| unsafe {
            create(stream_ptr, &mut raw)
        })?;
        let handle = wrap_handle(bindings, HandleKind::Pipeline, "vx_pipeline_create", raw)?;
        Ok(Self {
            handle,
            bindings: Arc::clone(bindings),
        })
    }

    /// Free the native pipeline. Idempotent.
    pub fn release(&self) -> bool {
        self.handle.release()
    }
}

impl PipelineBackend for NativePipeline {
    fn insert_effect(&mut self, kind: &mut EffectKind, index: usize) -> Result<EffectId, RuntimeError> {
        let api = self.bindings.api();
        let mut id = 0i32;
        let call = match kind.category() {
            EffectCategory::Apm => "vx_pipeline_insert_apm",
            EffectCategory::Vad => "vx_pipeline_insert_vad",
            EffectCategory::Custom => "vx_pipeline_insert_custom",
        };

        self.bindings.invoke(call, &self.handle, |raw| match kind {
            EffectKind::Apm(config) => {
                let native = VxApmConfig::from(*config);
                unsafe { (api.pipeline_insert_apm)(raw, &native, index, &mut id) }
            }
            EffectKind::Vad(config) => {
                let native = VxVadConfig::from(*config);
                unsafe { (api.pipeline_insert_vad)(raw, &native, index, &mut id) }
            }
            EffectKind::Custom(slot) => {
                let user_data = slot.user_data().cast::<c_void>();
                unsafe { (api.pipeline_insert_custom)(raw, custom_effect_trampoline, user_data, index, &mut id) }
            }
        })?;
        Ok(EffectId(id))
    }

    fn move_effect(&mut self, id: EffectId, index: usize) -> Result<(), RuntimeError> {
        let move_effect = self.bindings.api().pipeline_move_effect;
        self.bindings.invoke("vx_pipeline_move_effect", &self.handle, |raw| unsafe {
            move_effect(raw, id.0, index)
        })
    }

    fn remove_effect(&mut self, id: EffectId) -> Result<(), RuntimeError> {
        let remove = self.bindings.api().pipeline_remove_effect;
        self.bindings.invoke("vx_pipeline_remove_effect", &self.handle, |raw| unsafe {
            remove(raw, id.0)
        })
    }

    fn effect_count(&self) -> Result<usize, RuntimeError> {
        let get_count = self.bindings.api().pipeline_get_effect_count;
        let mut count = 0usize;
        self.bindings.invoke("vx_pipeline_get_effect_count", &self.handle, |raw| unsafe {
            get_count(raw, &mut count)
        })?;
        Ok(count)
    }

    fn effect_id_at(&self, index: usize) -> Result<EffectId, RuntimeError> {
        let get_id = self.bindings.api().pipeline_get_effect_id;
        let mut id = 0i32;
        self.bindings.invoke("vx_pipeline_get_effect_id", &self.handle, |raw| unsafe {
            get_id(raw, index, &mut id)
        })?;
        Ok(EffectId(id))
    }

    fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }
}

/// Entry point the native pipeline calls for custom effects.
///
/// `user_data` is the `*mut Box<dyn CustomEffect>` from
/// [`CustomEffectSlot::user_data`](voice_runtime_core::CustomEffectSlot::user_data).
/// A panicking effect must not unwind into native code; its frame is
/// silenced instead.
unsafe extern "C" fn custom_effect_trampoline(
    user_data: *mut c_void,
    samples: *mut f32,
    len: usize,
    channels: u16,
    sample_rate: u32,
) {
    if user_data.is_null() || samples.is_null() {
        return;
    }
    // SAFETY: the slot outlives its registration in the native pipeline, and
    // the stream is driven from one thread at a time, so nothing else holds
    // the effect or the frame during this call.
    let effect = &mut *user_data.cast::<Box<dyn CustomEffect>>();
    let frame = slice::from_raw_parts_mut(samples, len);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        effect.process(&mut *frame, channels, sample_rate);
    }));
    if outcome.is_err() {
        log::error!("Custom effect '{}' panicked, silencing frame", effect.name());
        frame.fill(0.0);
    }
}
