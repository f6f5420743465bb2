use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of native object a [`NativeHandle`](crate::NativeHandle) can own.
///
/// Every kind shares the same lifecycle shape; they differ only in which
/// native `*_free` function releases them and whether they need a native
/// initialization step before they are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Library,
    Cipher,
    ConnectionPool,
    Encoder,
    Decoder,
    Pipeline,
    Room,
    TokenGenerator,
}

impl HandleKind {
    /// Whether a handle of this kind must be marked initialized after a
    /// successful native creation call before it counts as alive.
    ///
    /// Ciphers and token generators have no native init step.
    pub fn requires_initialization(self) -> bool {
        !matches!(self, Self::Cipher | Self::TokenGenerator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Cipher => "cipher",
            Self::ConnectionPool => "connection pool",
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
            Self::Pipeline => "pipeline",
            Self::Room => "room",
            Self::TokenGenerator => "token generator",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native handle state machine.
///
/// ```text
/// Uninitialized ─mark_initialized─→ Alive ─release─→ Released
///       │                                          ↑
///       └──────────────────release─────────────────┘
/// any non-released state ─invalidate─→ Invalid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Alive,
    Released,
    Invalid,
}

impl HandleState {
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }

    /// Released and invalid handles never come back.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Invalid)
    }
}

/// Library runtime state machine.
///
/// ```text
/// Uninitialized → Initializing → Initialized → Released
///       ↑               │                          │
///       └───(failure)───┘      (re-initialize) ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Initializing,
    Initialized,
    Released,
}

impl RuntimeState {
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized)
    }

    /// Whether `initialize` may build a fresh library handle from this state.
    pub fn can_initialize(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Released)
    }
}
