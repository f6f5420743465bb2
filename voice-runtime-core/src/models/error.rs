use thiserror::Error;

use super::state::HandleKind;

/// Errors that can occur anywhere between the caller and the native library.
///
/// Loader and initialization variants are fatal for the attempt that produced
/// them. Steady-state variants (`NativeCallFailed`, `NoData`) are returned to the
/// caller, who decides whether to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("native library not found (tried {attempted:?}): {last_error}")]
    LibraryNotFound {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("native initialization failed with code {code}: {message}")]
    NativeInitializationFailed { code: i32, message: String },

    #[error("runtime already initialized")]
    AlreadyInitialized,

    #[error("{kind} handle is not alive")]
    HandleNotAlive { kind: HandleKind },

    #[error("native call {call} failed with code {code}: {message}")]
    NativeCallFailed {
        call: &'static str,
        code: i32,
        message: String,
    },

    #[error("no data available")]
    NoData,

    #[error("capture buffer corrupted: {0}")]
    BufferCorrupted(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl RuntimeError {
    /// `NoData` is a status, not a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn native(call: &'static str, code: i32, message: impl Into<String>) -> Self {
        Self::NativeCallFailed {
            call,
            code,
            message: message.into(),
        }
    }
}
