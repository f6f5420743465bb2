//! In-process stand-in for the native voice engine, for tests.
//!
//! Objects are heap-allocated Rust structs behind the opaque pointers. Each
//! library records calls into the [`FakeStats`] installed on the thread that
//! created it; children inherit their parent's stats.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use voice_runtime_core::models::config::RuntimeConfiguration;
use voice_runtime_core::models::error::RuntimeError;

use crate::ffi::{EffectCallback, NativeApi, VxApmConfig, VxStatus, VxVadConfig, VX_NO_DATA, VX_OK};
use crate::library::NativeBindings;

pub(crate) const LOCATION: &str = "fake/libvoxengine.so";

#[derive(Debug, Default)]
pub(crate) struct FakeStats {
    pub library_creates: AtomicUsize,
    pub library_frees: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub object_frees: AtomicUsize,
    pub effect_callbacks: AtomicUsize,
    pub fail_removes: AtomicBool,
}

thread_local! {
    static SCENARIO: RefCell<Arc<FakeStats>> = RefCell::new(Arc::new(FakeStats::default()));
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Record calls from libraries, ciphers and token generators created on this thread.
pub(crate) fn install(stats: Arc<FakeStats>) {
    SCENARIO.with(|scenario| *scenario.borrow_mut() = stats);
}

fn scenario() -> Arc<FakeStats> {
    SCENARIO.with(|scenario| Arc::clone(&scenario.borrow()))
}

fn fail(code: VxStatus, message: &str) -> VxStatus {
    LAST_ERROR.with(|last| *last.borrow_mut() = CString::new(message).unwrap_or_default());
    code
}

pub(crate) fn bindings() -> NativeBindings {
    NativeBindings::from_api(api(), PathBuf::from(LOCATION))
}

pub(crate) fn binder(_config: &RuntimeConfiguration) -> Result<NativeBindings, RuntimeError> {
    Ok(bindings())
}

pub(crate) fn missing_binder(config: &RuntimeConfiguration) -> Result<NativeBindings, RuntimeError> {
    Err(RuntimeError::LibraryNotFound {
        attempted: vec![config.library_name.clone()],
        last_error: "cannot open shared object file".into(),
    })
}

pub(crate) fn api() -> NativeApi {
    NativeApi {
        library_create,
        library_initialize,
        library_shutdown,
        library_free,
        get_last_error,
        encoder_create: stream_create,
        encoder_free: stream_free,
        encoder_push_samples,
        encoder_pop_packet,
        decoder_create: stream_create,
        decoder_free: stream_free,
        decoder_push_packet,
        decoder_pop_samples,
        pipeline_create,
        pipeline_free,
        pipeline_insert_apm,
        pipeline_insert_vad,
        pipeline_insert_custom,
        pipeline_move_effect,
        pipeline_remove_effect,
        pipeline_get_effect_count,
        pipeline_get_effect_id,
        connection_pool_create,
        connection_pool_free,
        room_create,
        room_free,
        room_push_datagram,
        room_pop_datagram,
        cipher_create,
        cipher_free,
        cipher_encrypt: cipher_apply,
        cipher_decrypt: cipher_apply,
        token_generator_create,
        token_generator_free,
        token_generator_generate,
    }
}

unsafe fn boxed<T>(out: *mut *mut c_void, value: T) -> VxStatus {
    *out = Box::into_raw(Box::new(value)).cast();
    VX_OK
}

unsafe fn pop_front_into(queue: &mut VecDeque<Vec<u8>>, buffer: *mut u8, capacity: usize, written: *mut usize) -> VxStatus {
    *written = 0;
    let Some(front) = queue.front() else {
        return VX_NO_DATA;
    };
    if front.len() > capacity {
        return fail(-5, "buffer too small");
    }
    ptr::copy_nonoverlapping(front.as_ptr(), buffer, front.len());
    *written = front.len();
    queue.pop_front();
    VX_OK
}

// Library

struct FakeLibrary {
    stats: Arc<FakeStats>,
    initialized: bool,
}

unsafe extern "C" fn library_create() -> *mut c_void {
    let stats = scenario();
    stats.library_creates.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(FakeLibrary {
        stats,
        initialized: false,
    }))
    .cast()
}

unsafe extern "C" fn library_initialize(library: *mut c_void, api_version: u32) -> VxStatus {
    let library = &mut *library.cast::<FakeLibrary>();
    if api_version != 1 {
        return fail(-2, &format!("unsupported api version {}", api_version));
    }
    library.initialized = true;
    VX_OK
}

unsafe extern "C" fn library_shutdown(library: *mut c_void) -> VxStatus {
    let library = &mut *library.cast::<FakeLibrary>();
    library.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
    library.initialized = false;
    VX_OK
}

unsafe extern "C" fn library_free(library: *mut c_void) -> VxStatus {
    let library = Box::from_raw(library.cast::<FakeLibrary>());
    library.stats.library_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

unsafe extern "C" fn get_last_error() -> *const c_char {
    LAST_ERROR.with(|last| last.borrow().as_ptr())
}

// Encoder and decoder

struct FakeStream {
    stats: Arc<FakeStats>,
    sample_rate: u32,
    channels: u16,
    pipeline: *mut FakePipeline,
    packets: VecDeque<Vec<u8>>,
    samples: VecDeque<f32>,
}

unsafe extern "C" fn stream_create(library: *mut c_void, sample_rate: u32, channels: u16, out: *mut *mut c_void) -> VxStatus {
    let library = &*library.cast::<FakeLibrary>();
    if !library.initialized {
        return fail(-3, "library not initialized");
    }
    if sample_rate == 0 || channels == 0 {
        return fail(-4, "invalid stream format");
    }
    boxed(
        out,
        FakeStream {
            stats: Arc::clone(&library.stats),
            sample_rate,
            channels,
            pipeline: ptr::null_mut(),
            packets: VecDeque::new(),
            samples: VecDeque::new(),
        },
    )
}

unsafe extern "C" fn stream_free(stream: *mut c_void) -> VxStatus {
    let stream = Box::from_raw(stream.cast::<FakeStream>());
    if !stream.pipeline.is_null() {
        (*stream.pipeline).stream = ptr::null_mut();
    }
    stream.stats.object_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

unsafe fn run_pipeline(stream: &FakeStream, frame: &mut [f32]) {
    if stream.pipeline.is_null() {
        return;
    }
    for effect in &(*stream.pipeline).effects {
        if let Some((callback, user_data)) = effect.callback {
            stream.stats.effect_callbacks.fetch_add(1, Ordering::SeqCst);
            callback(user_data, frame.as_mut_ptr(), frame.len(), stream.channels, stream.sample_rate);
        }
    }
}

/// "Encodes" by running the pipeline and packing samples as little-endian f32.
unsafe extern "C" fn encoder_push_samples(stream: *mut c_void, samples: *const f32, len: usize) -> VxStatus {
    let stream = &mut *stream.cast::<FakeStream>();
    if len == 0 {
        return VX_OK;
    }
    let mut frame = slice::from_raw_parts(samples, len).to_vec();
    run_pipeline(stream, &mut frame);
    stream
        .packets
        .push_back(frame.iter().flat_map(|sample| sample.to_le_bytes()).collect());
    VX_OK
}

unsafe extern "C" fn encoder_pop_packet(stream: *mut c_void, buffer: *mut u8, capacity: usize, written: *mut usize) -> VxStatus {
    let stream = &mut *stream.cast::<FakeStream>();
    pop_front_into(&mut stream.packets, buffer, capacity, written)
}

unsafe extern "C" fn decoder_push_packet(stream: *mut c_void, data: *const u8, len: usize) -> VxStatus {
    let stream = &mut *stream.cast::<FakeStream>();
    if len % 4 != 0 {
        return fail(-6, "truncated packet");
    }
    let bytes = slice::from_raw_parts(data, len);
    let mut frame: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    run_pipeline(stream, &mut frame);
    stream.samples.extend(frame);
    VX_OK
}

unsafe extern "C" fn decoder_pop_samples(stream: *mut c_void, buffer: *mut f32, capacity: usize, written: *mut usize) -> VxStatus {
    let stream = &mut *stream.cast::<FakeStream>();
    *written = 0;
    if stream.samples.is_empty() {
        return VX_NO_DATA;
    }
    let count = capacity.min(stream.samples.len());
    let out = slice::from_raw_parts_mut(buffer, count);
    for (dst, src) in out.iter_mut().zip(stream.samples.drain(..count)) {
        *dst = src;
    }
    *written = count;
    VX_OK
}

// Pipeline

struct FakeEffect {
    id: i32,
    callback: Option<(EffectCallback, *mut c_void)>,
}

struct FakePipeline {
    stats: Arc<FakeStats>,
    stream: *mut FakeStream,
    effects: Vec<FakeEffect>,
    next_id: i32,
}

unsafe extern "C" fn pipeline_create(stream: *mut c_void, out: *mut *mut c_void) -> VxStatus {
    let stream = stream.cast::<FakeStream>();
    let pipeline = Box::into_raw(Box::new(FakePipeline {
        stats: Arc::clone(&(*stream).stats),
        stream,
        effects: Vec::new(),
        next_id: 100,
    }));
    (*stream).pipeline = pipeline;
    *out = pipeline.cast();
    VX_OK
}

unsafe extern "C" fn pipeline_free(pipeline: *mut c_void) -> VxStatus {
    let pipeline = Box::from_raw(pipeline.cast::<FakePipeline>());
    if !pipeline.stream.is_null() {
        (*pipeline.stream).pipeline = ptr::null_mut();
    }
    pipeline.stats.object_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

unsafe fn insert_effect(
    pipeline: *mut c_void,
    callback: Option<(EffectCallback, *mut c_void)>,
    index: usize,
    out_id: *mut i32,
) -> VxStatus {
    let pipeline = &mut *pipeline.cast::<FakePipeline>();
    pipeline.next_id += 1;
    let id = pipeline.next_id;
    let index = index.min(pipeline.effects.len());
    pipeline.effects.insert(index, FakeEffect { id, callback });
    *out_id = id;
    VX_OK
}

unsafe extern "C" fn pipeline_insert_apm(pipeline: *mut c_void, config: *const VxApmConfig, index: usize, out_id: *mut i32) -> VxStatus {
    if config.is_null() || (*config).noise_suppression > 4 {
        return fail(-7, "invalid apm configuration");
    }
    insert_effect(pipeline, None, index, out_id)
}

unsafe extern "C" fn pipeline_insert_vad(pipeline: *mut c_void, config: *const VxVadConfig, index: usize, out_id: *mut i32) -> VxStatus {
    if config.is_null() || !(0.0..=1.0).contains(&(*config).sensitivity) {
        return fail(-7, "vad sensitivity out of range");
    }
    insert_effect(pipeline, None, index, out_id)
}

unsafe extern "C" fn pipeline_insert_custom(
    pipeline: *mut c_void,
    callback: EffectCallback,
    user_data: *mut c_void,
    index: usize,
    out_id: *mut i32,
) -> VxStatus {
    insert_effect(pipeline, Some((callback, user_data)), index, out_id)
}

/// Shifts neighbours; indices past the end are rejected.
unsafe extern "C" fn pipeline_move_effect(pipeline: *mut c_void, effect_id: i32, index: usize) -> VxStatus {
    let pipeline = &mut *pipeline.cast::<FakePipeline>();
    if index > pipeline.effects.len() {
        return fail(-8, "index out of range");
    }
    let Some(from) = pipeline.effects.iter().position(|e| e.id == effect_id) else {
        return fail(-9, "unknown effect");
    };
    let effect = pipeline.effects.remove(from);
    let index = index.min(pipeline.effects.len());
    pipeline.effects.insert(index, effect);
    VX_OK
}

unsafe extern "C" fn pipeline_remove_effect(pipeline: *mut c_void, effect_id: i32) -> VxStatus {
    let pipeline = &mut *pipeline.cast::<FakePipeline>();
    if pipeline.stats.fail_removes.load(Ordering::SeqCst) {
        return fail(-10, "pipeline busy");
    }
    let Some(from) = pipeline.effects.iter().position(|e| e.id == effect_id) else {
        return fail(-9, "unknown effect");
    };
    pipeline.effects.remove(from);
    VX_OK
}

unsafe extern "C" fn pipeline_get_effect_count(pipeline: *mut c_void, out_count: *mut usize) -> VxStatus {
    let pipeline = &*pipeline.cast::<FakePipeline>();
    *out_count = pipeline.effects.len();
    VX_OK
}

unsafe extern "C" fn pipeline_get_effect_id(pipeline: *mut c_void, index: usize, out_id: *mut i32) -> VxStatus {
    let pipeline = &*pipeline.cast::<FakePipeline>();
    match pipeline.effects.get(index) {
        Some(effect) => {
            *out_id = effect.id;
            VX_OK
        }
        None => fail(-8, "index out of range"),
    }
}

// Rooms

struct FakePool {
    stats: Arc<FakeStats>,
}

struct FakeRoom {
    stats: Arc<FakeStats>,
    datagrams: VecDeque<Vec<u8>>,
}

unsafe extern "C" fn connection_pool_create(library: *mut c_void, out: *mut *mut c_void) -> VxStatus {
    let library = &*library.cast::<FakeLibrary>();
    if !library.initialized {
        return fail(-3, "library not initialized");
    }
    boxed(
        out,
        FakePool {
            stats: Arc::clone(&library.stats),
        },
    )
}

unsafe extern "C" fn connection_pool_free(pool: *mut c_void) -> VxStatus {
    let pool = Box::from_raw(pool.cast::<FakePool>());
    pool.stats.object_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

unsafe extern "C" fn room_create(library: *mut c_void, pool: *mut c_void, out: *mut *mut c_void) -> VxStatus {
    let library = &*library.cast::<FakeLibrary>();
    if !library.initialized || pool.is_null() {
        return fail(-3, "library or pool unavailable");
    }
    boxed(
        out,
        FakeRoom {
            stats: Arc::clone(&library.stats),
            datagrams: VecDeque::new(),
        },
    )
}

unsafe extern "C" fn room_free(room: *mut c_void) -> VxStatus {
    let room = Box::from_raw(room.cast::<FakeRoom>());
    room.stats.object_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

/// Loops datagrams back to the sender.
unsafe extern "C" fn room_push_datagram(room: *mut c_void, data: *const u8, len: usize) -> VxStatus {
    let room = &mut *room.cast::<FakeRoom>();
    if len == 0 {
        return fail(-6, "empty datagram");
    }
    room.datagrams.push_back(slice::from_raw_parts(data, len).to_vec());
    VX_OK
}

unsafe extern "C" fn room_pop_datagram(room: *mut c_void, buffer: *mut u8, capacity: usize, written: *mut usize) -> VxStatus {
    let room = &mut *room.cast::<FakeRoom>();
    pop_front_into(&mut room.datagrams, buffer, capacity, written)
}

// Cipher and token generator

struct FakeKeyed {
    stats: Arc<FakeStats>,
    key: Vec<u8>,
}

unsafe fn keyed_create(key: *const u8, len: usize, out: *mut *mut c_void) -> VxStatus {
    if key.is_null() || len == 0 {
        return fail(-11, "empty key");
    }
    boxed(
        out,
        FakeKeyed {
            stats: scenario(),
            key: slice::from_raw_parts(key, len).to_vec(),
        },
    )
}

unsafe extern "C" fn keyed_free(object: *mut c_void) -> VxStatus {
    let object = Box::from_raw(object.cast::<FakeKeyed>());
    object.stats.object_frees.fetch_add(1, Ordering::SeqCst);
    VX_OK
}

unsafe extern "C" fn cipher_create(key: *const u8, len: usize, out: *mut *mut c_void) -> VxStatus {
    keyed_create(key, len, out)
}

unsafe extern "C" fn cipher_free(cipher: *mut c_void) -> VxStatus {
    keyed_free(cipher)
}

/// Repeating-key XOR, so encrypt and decrypt are the same call.
unsafe extern "C" fn cipher_apply(
    cipher: *mut c_void,
    input: *const u8,
    len: usize,
    output: *mut u8,
    capacity: usize,
    written: *mut usize,
) -> VxStatus {
    let cipher = &*cipher.cast::<FakeKeyed>();
    *written = 0;
    if capacity < len {
        return fail(-5, "buffer too small");
    }
    if len == 0 {
        return VX_OK;
    }
    let input = slice::from_raw_parts(input, len);
    let output = slice::from_raw_parts_mut(output, len);
    for (i, (dst, src)) in output.iter_mut().zip(input).enumerate() {
        *dst = src ^ cipher.key[i % cipher.key.len()];
    }
    *written = len;
    VX_OK
}

unsafe extern "C" fn token_generator_create(secret: *const u8, len: usize, out: *mut *mut c_void) -> VxStatus {
    keyed_create(secret, len, out)
}

unsafe extern "C" fn token_generator_free(generator: *mut c_void) -> VxStatus {
    keyed_free(generator)
}

unsafe extern "C" fn token_generator_generate(
    generator: *mut c_void,
    identity: *const c_char,
    buffer: *mut c_char,
    capacity: usize,
    written: *mut usize,
) -> VxStatus {
    let generator = &*generator.cast::<FakeKeyed>();
    *written = 0;
    let identity = CStr::from_ptr(identity).to_string_lossy();
    if identity.is_empty() {
        return fail(-12, "empty identity");
    }
    let checksum = generator
        .key
        .iter()
        .chain(identity.as_bytes())
        .fold(0u32, |acc, b| acc.rotate_left(5) ^ u32::from(*b));
    let token = format!("{}.{:08x}", identity, checksum);
    if token.len() + 1 > capacity {
        return fail(-5, "buffer too small");
    }
    ptr::copy_nonoverlapping(token.as_ptr().cast::<c_char>(), buffer, token.len());
    *buffer.add(token.len()) = 0;
    *written = token.len();
    VX_OK
}
