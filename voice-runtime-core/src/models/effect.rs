use std::fmt;

use serde::{Deserialize, Serialize};

use crate::traits::custom_effect::CustomEffect;

/// Native-assigned effect identifier. Never reused once removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectId(pub i32);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Noise suppression strength for the acoustic processing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseSuppressionLevel {
    Off,
    Low,
    #[default]
    Moderate,
    High,
    VeryHigh,
}

impl NoiseSuppressionLevel {
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 1,
            Self::Moderate => 2,
            Self::High => 3,
            Self::VeryHigh => 4,
        }
    }
}

/// Settings for the native acoustic processing module (APM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApmConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: NoiseSuppressionLevel,
    pub gain_control: bool,
    pub high_pass_filter: bool,
}

impl Default for ApmConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: NoiseSuppressionLevel::Moderate,
            gain_control: true,
            high_pass_filter: true,
        }
    }
}

/// Settings for the native voice-activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadConfig {
    /// Detection sensitivity in `0.0..=1.0`.
    pub sensitivity: f32,
    /// How long speech is held after the last active frame.
    pub hangover_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.5,
            hangover_ms: 300,
        }
    }
}

/// Owns a boxed [`CustomEffect`] at a stable heap address.
///
/// The outer box gives the native side a thin pointer that stays valid while
/// the effect moves around inside the managed list.
pub struct CustomEffectSlot {
    effect: Box<Box<dyn CustomEffect>>,
}

impl CustomEffectSlot {
    pub fn new(effect: impl CustomEffect + 'static) -> Self {
        Self {
            effect: Box::new(Box::new(effect)),
        }
    }

    /// Thin pointer handed to the native pipeline as callback user data.
    pub fn user_data(&mut self) -> *mut Box<dyn CustomEffect> {
        &mut *self.effect
    }

    pub fn effect(&self) -> &dyn CustomEffect {
        &**self.effect
    }

    pub fn effect_mut(&mut self) -> &mut dyn CustomEffect {
        &mut **self.effect
    }

    pub fn downcast_ref<T: CustomEffect + 'static>(&self) -> Option<&T> {
        self.effect().as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: CustomEffect + 'static>(&mut self) -> Option<&mut T> {
        self.effect_mut().as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for CustomEffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEffectSlot")
            .field("name", &self.effect().name())
            .finish()
    }
}

/// What an effect in a pipeline does.
#[derive(Debug)]
pub enum EffectKind {
    Apm(ApmConfig),
    Vad(VadConfig),
    Custom(CustomEffectSlot),
}

impl EffectKind {
    pub fn custom(effect: impl CustomEffect + 'static) -> Self {
        Self::Custom(CustomEffectSlot::new(effect))
    }

    pub fn category(&self) -> EffectCategory {
        match self {
            Self::Apm(_) => EffectCategory::Apm,
            Self::Vad(_) => EffectCategory::Vad,
            Self::Custom(_) => EffectCategory::Custom,
        }
    }
}

/// Tag of an [`EffectKind`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectCategory {
    Apm,
    Vad,
    Custom,
}
