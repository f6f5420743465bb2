use crate::models::effect::{EffectId, EffectKind};
use crate::models::error::RuntimeError;

/// The native side of an effect pipeline.
///
/// The backend owns the authoritative order. [`EffectPipeline`](crate::EffectPipeline)
/// calls one mutating method, then re-reads `effect_count`/`effect_id_at` to
/// reconcile its managed list.
pub trait PipelineBackend {
    /// Insert an effect of the given kind at `index`, returning the native-assigned id.
    ///
    /// `kind` is borrowed mutably so custom effects can hand the native side a
    /// stable pointer to their boxed state.
    fn insert_effect(&mut self, kind: &mut EffectKind, index: usize) -> Result<EffectId, RuntimeError>;

    fn move_effect(&mut self, id: EffectId, index: usize) -> Result<(), RuntimeError>;

    fn remove_effect(&mut self, id: EffectId) -> Result<(), RuntimeError>;

    fn effect_count(&self) -> Result<usize, RuntimeError>;

    fn effect_id_at(&self, index: usize) -> Result<EffectId, RuntimeError>;

    /// Whether native calls can still be made. Disposal skips native removal otherwise.
    fn is_alive(&self) -> bool {
        true
    }
}
