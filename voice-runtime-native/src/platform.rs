//! Platform tags and native binary naming.

use std::fmt;
use std::iter;
use std::path::PathBuf;

use voice_runtime_core::models::config::RuntimeConfiguration;

/// Platforms the native voice engine ships binaries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Android,
    MacOs,
    Ios,
    Windows,
}

impl Platform {
    /// The platform this process runs on. Other Unix systems use Linux naming.
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Android => "android",
            Self::MacOs => "macos",
            Self::Ios => "ios",
            Self::Windows => "windows",
        }
    }

    /// Platform file name for a library base name, e.g. `libvoxengine.so`.
    pub fn file_name(self, library_name: &str) -> String {
        match self {
            Self::Linux | Self::Android => format!("lib{}.so", library_name),
            Self::MacOs | Self::Ios => format!("lib{}.dylib", library_name),
            Self::Windows => format!("{}.dll", library_name),
        }
    }

    /// Ordered candidate paths for the configured library.
    ///
    /// The bare file name comes first so the platform's own search path
    /// applies, then each search directory joined with the file name. An
    /// explicit candidate list replaces the computed one.
    pub fn candidates(self, config: &RuntimeConfiguration) -> Vec<PathBuf> {
        if let Some(explicit) = &config.candidate_paths {
            return explicit.clone();
        }
        let file_name = self.file_name(&config.library_name);
        iter::once(PathBuf::from(&file_name))
            .chain(config.search_directories.iter().map(|dir| dir.join(&file_name)))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
