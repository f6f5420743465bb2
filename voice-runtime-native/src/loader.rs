//! Dynamic loading of the native voice engine.
//!
//! `dlopen`/`dlsym`/`dlclose` through `libc` on Unix, `LoadLibraryW`/
//! `GetProcAddress`/`FreeLibrary` through the `windows` crate on Windows.

use std::ffi::{c_void, CString};
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use parking_lot::Mutex;

use voice_runtime_core::models::config::RuntimeConfiguration;
use voice_runtime_core::models::error::RuntimeError;

use crate::platform::Platform;

/// Resolves and loads the platform binary from an ordered candidate list.
#[derive(Debug, Clone, Copy)]
pub struct PlatformLoader {
    platform: Platform,
}

impl PlatformLoader {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn current() -> Self {
        Self::new(Platform::current())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn candidates(&self, config: &RuntimeConfiguration) -> Vec<PathBuf> {
        self.platform.candidates(config)
    }

    /// Try each candidate in order and return the first that loads.
    ///
    /// Fails with `LibraryNotFound` listing every attempt and the last
    /// error the platform loader reported.
    pub fn load(&self, candidates: &[PathBuf]) -> Result<LoadedBinary, RuntimeError> {
        let mut attempted = Vec::with_capacity(candidates.len());
        let mut last_error = String::from("no candidate paths");

        for candidate in candidates {
            attempted.push(candidate.display().to_string());
            match sys::open(candidate) {
                Ok(module) => {
                    log::info!(
                        "Loaded native library for {} from {}",
                        self.platform,
                        candidate.display()
                    );
                    return Ok(LoadedBinary {
                        module: Mutex::new(Some(Module(module))),
                        location: candidate.clone(),
                    });
                }
                Err(e) => {
                    log::debug!("Could not load {}: {}", candidate.display(), e);
                    last_error = e;
                }
            }
        }

        Err(RuntimeError::LibraryNotFound {
            attempted,
            last_error,
        })
    }

    pub fn load_configured(&self, config: &RuntimeConfiguration) -> Result<LoadedBinary, RuntimeError> {
        self.load(&self.candidates(config))
    }
}

#[derive(Debug)]
struct Module(NonNull<c_void>);

// SAFETY: platform module handles are process-global tokens; the loader APIs
// accept them from any thread.
unsafe impl Send for Module {}
unsafe impl Sync for Module {}

/// A loaded native binary. Unloaded on drop.
#[derive(Debug)]
pub struct LoadedBinary {
    module: Mutex<Option<Module>>,
    location: PathBuf,
}

impl LoadedBinary {
    /// The candidate path that loaded.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.module.lock().is_some()
    }

    /// Resolve an exported function as the function-pointer type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type matching the
    /// export's real signature, and the returned pointer must not be called
    /// after this binary is unloaded.
    pub unsafe fn symbol<F: Copy>(&self, name: &str) -> Result<F, RuntimeError> {
        if mem::size_of::<F>() != mem::size_of::<*mut c_void>() {
            return Err(RuntimeError::SymbolNotFound(format!(
                "{} (requested type is not a function pointer)",
                name
            )));
        }
        let c_name = CString::new(name)
            .map_err(|_| RuntimeError::SymbolNotFound(name.to_string()))?;

        let guard = self.module.lock();
        let Some(module) = guard.as_ref() else {
            return Err(RuntimeError::SymbolNotFound(format!("{} (binary unloaded)", name)));
        };
        let address = sys::symbol(module.0, &c_name)
            .ok_or_else(|| RuntimeError::SymbolNotFound(name.to_string()))?;

        Ok(mem::transmute_copy::<*mut c_void, F>(&address.as_ptr()))
    }

    /// Unload the binary. Idempotent.
    ///
    /// A failing platform unload is logged, not returned; the binary is
    /// marked unloaded either way. Returns true only if this call unloaded
    /// it successfully.
    pub fn unload(&self) -> bool {
        let Some(module) = self.module.lock().take() else {
            return false;
        };
        match sys::close(module.0) {
            Ok(()) => {
                log::debug!("Unloaded native library {}", self.location.display());
                true
            }
            Err(e) => {
                log::warn!(
                    "Failed to unload native library {}: {}",
                    self.location.display(),
                    e
                );
                false
            }
        }
    }
}

impl Drop for LoadedBinary {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(unix)]
mod sys {
    use std::ffi::{c_void, CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr::NonNull;

    pub fn open(path: &Path) -> Result<NonNull<c_void>, String> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| "path contains an interior NUL byte".to_string())?;
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        NonNull::new(handle).ok_or_else(last_error)
    }

    pub fn symbol(module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { libc::dlsym(module.as_ptr(), name.as_ptr()) })
    }

    pub fn close(module: NonNull<c_void>) -> Result<(), String> {
        if unsafe { libc::dlclose(module.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(last_error())
        }
    }

    fn last_error() -> String {
        let message = unsafe { libc::dlerror() };
        if message.is_null() {
            return "unknown dynamic loader error".to_string();
        }
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(target_os = "windows")]
mod sys {
    use std::ffi::{c_void, CStr};
    use std::iter;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr::NonNull;

    use windows::core::{PCSTR, PCWSTR};
    use windows::Win32::Foundation::{FreeLibrary, HMODULE};
    use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

    pub fn open(path: &Path) -> Result<NonNull<c_void>, String> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(iter::once(0)).collect();
        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }
            .map_err(|e| format!("LoadLibraryW failed: {}", e))?;
        NonNull::new(module.0).ok_or_else(|| "LoadLibraryW returned a null module".to_string())
    }

    pub fn symbol(module: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        let address = unsafe { GetProcAddress(HMODULE(module.as_ptr()), PCSTR(name.as_ptr().cast())) }?;
        NonNull::new(address as *mut c_void)
    }

    pub fn close(module: NonNull<c_void>) -> Result<(), String> {
        unsafe { FreeLibrary(HMODULE(module.as_ptr())) }
            .map_err(|e| format!("FreeLibrary failed: {}", e))
    }
}

#[cfg(not(any(unix, target_os = "windows")))]
mod sys {
    use std::ffi::{c_void, CStr};
    use std::path::Path;
    use std::ptr::NonNull;

    pub fn open(_path: &Path) -> Result<NonNull<c_void>, String> {
        Err("dynamic loading is not supported on this platform".to_string())
    }

    pub fn symbol(_module: NonNull<c_void>, _name: &CStr) -> Option<NonNull<c_void>> {
        None
    }

    pub fn close(_module: NonNull<c_void>) -> Result<(), String> {
        Ok(())
    }
}
