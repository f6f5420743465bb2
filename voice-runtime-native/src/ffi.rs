//! C ABI of the native voice engine.
//!
//! Every entry point returns a [`VxStatus`]: `VX_OK` on success, `VX_NO_DATA`
//! when a pop had nothing to return, anything else on failure with a message
//! available from `vx_get_last_error` on the calling thread.

use std::ffi::{c_char, c_void};

use voice_runtime_core::models::effect::{ApmConfig, VadConfig};
use voice_runtime_core::models::error::RuntimeError;

use crate::loader::LoadedBinary;

pub type VxStatus = i32;

pub const VX_OK: VxStatus = 0;
pub const VX_NO_DATA: VxStatus = 1;

/// Native-side view of [`ApmConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VxApmConfig {
    pub echo_cancellation: u8,
    pub noise_suppression: u8,
    pub gain_control: u8,
    pub high_pass_filter: u8,
}

impl From<ApmConfig> for VxApmConfig {
    fn from(config: ApmConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation.into(),
            noise_suppression: config.noise_suppression.as_raw(),
            gain_control: config.gain_control.into(),
            high_pass_filter: config.high_pass_filter.into(),
        }
    }
}

/// Native-side view of [`VadConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VxVadConfig {
    pub sensitivity: f32,
    pub hangover_ms: u32,
}

impl From<VadConfig> for VxVadConfig {
    fn from(config: VadConfig) -> Self {
        Self {
            sensitivity: config.sensitivity,
            hangover_ms: config.hangover_ms,
        }
    }
}

/// Called by the native pipeline for each frame passing a custom effect.
pub type EffectCallback =
    unsafe extern "C" fn(user_data: *mut c_void, samples: *mut f32, len: usize, channels: u16, sample_rate: u32);

pub type CreateLibraryFn = unsafe extern "C" fn() -> *mut c_void;
pub type InitializeLibraryFn = unsafe extern "C" fn(library: *mut c_void, api_version: u32) -> VxStatus;
/// Shape shared by every `*_free` entry point and `vx_library_shutdown`.
pub type ObjectFn = unsafe extern "C" fn(object: *mut c_void) -> VxStatus;
pub type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

pub type CreateStreamFn = unsafe extern "C" fn(
    library: *mut c_void,
    sample_rate: u32,
    channels: u16,
    out: *mut *mut c_void,
) -> VxStatus;
pub type PushSamplesFn = unsafe extern "C" fn(stream: *mut c_void, samples: *const f32, len: usize) -> VxStatus;
pub type PopSamplesFn =
    unsafe extern "C" fn(stream: *mut c_void, buffer: *mut f32, capacity: usize, written: *mut usize) -> VxStatus;
pub type PushBytesFn = unsafe extern "C" fn(object: *mut c_void, data: *const u8, len: usize) -> VxStatus;
pub type PopBytesFn =
    unsafe extern "C" fn(object: *mut c_void, buffer: *mut u8, capacity: usize, written: *mut usize) -> VxStatus;

/// `(parent, out)`: pipelines over a stream, connection pools over the library.
pub type CreateChildFn = unsafe extern "C" fn(parent: *mut c_void, out: *mut *mut c_void) -> VxStatus;
pub type CreateRoomFn =
    unsafe extern "C" fn(library: *mut c_void, pool: *mut c_void, out: *mut *mut c_void) -> VxStatus;
/// `(secret, len, out)`: ciphers and token generators.
pub type CreateKeyedFn = unsafe extern "C" fn(key: *const u8, len: usize, out: *mut *mut c_void) -> VxStatus;

pub type InsertApmFn = unsafe extern "C" fn(
    pipeline: *mut c_void,
    config: *const VxApmConfig,
    index: usize,
    out_id: *mut i32,
) -> VxStatus;
pub type InsertVadFn = unsafe extern "C" fn(
    pipeline: *mut c_void,
    config: *const VxVadConfig,
    index: usize,
    out_id: *mut i32,
) -> VxStatus;
pub type InsertCustomFn = unsafe extern "C" fn(
    pipeline: *mut c_void,
    callback: EffectCallback,
    user_data: *mut c_void,
    index: usize,
    out_id: *mut i32,
) -> VxStatus;
pub type MoveEffectFn = unsafe extern "C" fn(pipeline: *mut c_void, effect_id: i32, index: usize) -> VxStatus;
pub type RemoveEffectFn = unsafe extern "C" fn(pipeline: *mut c_void, effect_id: i32) -> VxStatus;
pub type EffectCountFn = unsafe extern "C" fn(pipeline: *mut c_void, out_count: *mut usize) -> VxStatus;
pub type EffectIdFn = unsafe extern "C" fn(pipeline: *mut c_void, index: usize, out_id: *mut i32) -> VxStatus;

pub type TransformFn = unsafe extern "C" fn(
    cipher: *mut c_void,
    input: *const u8,
    len: usize,
    output: *mut u8,
    capacity: usize,
    written: *mut usize,
) -> VxStatus;
pub type GenerateTokenFn = unsafe extern "C" fn(
    generator: *mut c_void,
    identity: *const c_char,
    buffer: *mut c_char,
    capacity: usize,
    written: *mut usize,
) -> VxStatus;

macro_rules! native_api {
    ($($field:ident: $ty:ty = $symbol:literal,)*) => {
        /// Function table resolved from the native binary.
        #[derive(Clone, Copy)]
        pub struct NativeApi {
            $(pub $field: $ty,)*
        }

        impl NativeApi {
            /// Resolve every entry point. Fails on the first missing export.
            pub fn resolve(binary: &LoadedBinary) -> Result<Self, RuntimeError> {
                // SAFETY: each field type is the documented signature of its export.
                unsafe {
                    Ok(Self {
                        $($field: binary.symbol::<$ty>($symbol)?,)*
                    })
                }
            }

            /// Exported symbol names, in table order.
            pub const SYMBOLS: &'static [&'static str] = &[$($symbol,)*];
        }
    };
}

native_api! {
    library_create: CreateLibraryFn = "vx_library_create",
    library_initialize: InitializeLibraryFn = "vx_library_initialize",
    library_shutdown: ObjectFn = "vx_library_shutdown",
    library_free: ObjectFn = "vx_library_free",
    get_last_error: LastErrorFn = "vx_get_last_error",

    encoder_create: CreateStreamFn = "vx_encoder_create",
    encoder_free: ObjectFn = "vx_encoder_free",
    encoder_push_samples: PushSamplesFn = "vx_encoder_push_samples",
    encoder_pop_packet: PopBytesFn = "vx_encoder_pop_packet",

    decoder_create: CreateStreamFn = "vx_decoder_create",
    decoder_free: ObjectFn = "vx_decoder_free",
    decoder_push_packet: PushBytesFn = "vx_decoder_push_packet",
    decoder_pop_samples: PopSamplesFn = "vx_decoder_pop_samples",

    pipeline_create: CreateChildFn = "vx_pipeline_create",
    pipeline_free: ObjectFn = "vx_pipeline_free",
    pipeline_insert_apm: InsertApmFn = "vx_pipeline_insert_apm",
    pipeline_insert_vad: InsertVadFn = "vx_pipeline_insert_vad",
    pipeline_insert_custom: InsertCustomFn = "vx_pipeline_insert_custom",
    pipeline_move_effect: MoveEffectFn = "vx_pipeline_move_effect",
    pipeline_remove_effect: RemoveEffectFn = "vx_pipeline_remove_effect",
    pipeline_get_effect_count: EffectCountFn = "vx_pipeline_get_effect_count",
    pipeline_get_effect_id: EffectIdFn = "vx_pipeline_get_effect_id",

    connection_pool_create: CreateChildFn = "vx_connection_pool_create",
    connection_pool_free: ObjectFn = "vx_connection_pool_free",
    room_create: CreateRoomFn = "vx_room_create",
    room_free: ObjectFn = "vx_room_free",
    room_push_datagram: PushBytesFn = "vx_room_push_datagram",
    room_pop_datagram: PopBytesFn = "vx_room_pop_datagram",

    cipher_create: CreateKeyedFn = "vx_cipher_create",
    cipher_free: ObjectFn = "vx_cipher_free",
    cipher_encrypt: TransformFn = "vx_cipher_encrypt",
    cipher_decrypt: TransformFn = "vx_cipher_decrypt",

    token_generator_create: CreateKeyedFn = "vx_token_generator_create",
    token_generator_free: ObjectFn = "vx_token_generator_free",
    token_generator_generate: GenerateTokenFn = "vx_token_generator_generate",
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("symbols", &Self::SYMBOLS.len())
            .finish_non_exhaustive()
    }
}
