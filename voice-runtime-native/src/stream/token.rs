use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;
use std::sync::Arc;

use voice_runtime_core::handle::native_handle::NativeHandle;
use voice_runtime_core::models::error::RuntimeError;
use voice_runtime_core::models::state::HandleKind;

use crate::library::NativeBindings;
use crate::runtime::LibraryRuntime;
use crate::stream::wrap_handle;

const TOKEN_CAPACITY: usize = 1024;

/// Native access-token generator. Usable as soon as it is created.
#[derive(Debug)]
pub struct TokenGenerator {
    handle: NativeHandle,
    bindings: Arc<NativeBindings>,
}

impl TokenGenerator {
    pub fn new(runtime: &LibraryRuntime, secret: &[u8]) -> Result<Self, RuntimeError> {
        let library = runtime.library()?;
        let bindings = Arc::clone(library.bindings());
        let create = bindings.api().token_generator_create;
        let mut raw: *mut c_void = ptr::null_mut();
        library.invoke("vx_token_generator_create", |_library| unsafe {
            create(secret.as_ptr(), secret.len(), &mut raw)
        })?;
        let handle = wrap_handle(&bindings, HandleKind::TokenGenerator, "vx_token_generator_create", raw)?;
        Ok(Self { handle, bindings })
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    /// Generate a token for `identity`.
    pub fn generate(&self, identity: &str) -> Result<String, RuntimeError> {
        let identity = CString::new(identity).map_err(|_| {
            RuntimeError::native("vx_token_generator_generate", -1, "identity contains a NUL byte")
        })?;

        let mut buffer = vec![0 as c_char; TOKEN_CAPACITY];
        let mut written = 0usize;
        let generate = self.bindings.api().token_generator_generate;
        self.bindings.invoke("vx_token_generator_generate", &self.handle, |raw| unsafe {
            generate(
                raw,
                identity.as_ptr(),
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut written,
            )
        })?;

        // Native writes a terminator; never read past the buffer if it did not.
        if let Some(last) = buffer.last_mut() {
            *last = 0;
        }
        let token = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        Ok(token.to_string_lossy().into_owned())
    }

    /// Free the native generator. Idempotent; also runs on drop.
    pub fn dispose(&self) -> bool {
        self.handle.release()
    }
}
