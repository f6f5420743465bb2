use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;
use voice_runtime_core::models::stream::StreamId;

use crate::ffi::TransformFn;
use crate::library::NativeBindings;
use crate::runtime::LibraryRuntime;
use crate::stream::wrap_handle;

/// Upper bound on bytes the native cipher adds to a payload (nonce and tag).
pub const CIPHER_OVERHEAD: usize = 32;

/// Native payload cipher. Usable as soon as it is created.
#[derive(Debug)]
pub struct Cipher {
    id: StreamId,
    handle: NativeHandle,
    bindings: Arc<NativeBindings>,
}

impl Cipher {
    pub fn new(runtime: &LibraryRuntime, key: &[u8]) -> Result<Self, RuntimeError> {
        let library = runtime.library()?;
        let bindings = Arc::clone(library.bindings());
        let create = bindings.api().cipher_create;
        let mut raw: *mut c_void = ptr::null_mut();
        library.invoke("vx_cipher_create", |_library| unsafe {
            create(key.as_ptr(), key.len(), &mut raw)
        })?;
        let handle = wrap_handle(&bindings, HandleKind::Cipher, "vx_cipher_create", raw)?;
        Ok(Self {
            id: StreamId::new(),
            handle,
            bindings,
        })
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        self.transform("vx_cipher_encrypt", self.bindings.api().cipher_encrypt, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        self.transform("vx_cipher_decrypt", self.bindings.api().cipher_decrypt, ciphertext)
    }

    /// Free the native cipher. Idempotent; also runs on drop.
    pub fn dispose(&self) -> bool {
        self.handle.release()
    }

    fn transform(&self, call: &'static str, native: TransformFn, input: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        let mut output = vec![0u8; input.len() + CIPHER_OVERHEAD];
        let mut written = 0usize;
        self.bindings.invoke(call, &self.handle, |raw| unsafe {
            native(
                raw,
                input.as_ptr(),
                input.len(),
                output.as_mut_ptr(),
                output.len(),
                &mut written,
            )
        })?;
        output.truncate(written);
        Ok(output)
    }
}
