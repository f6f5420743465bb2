use std::collections::HashMap;

use crate::models::effect::{EffectCategory, EffectId, EffectKind};
use crate::models::error::RuntimeError;
use crate::traits::custom_effect::CustomEffect;
use crate::traits::pipeline_backend::PipelineBackend;

/// One effect inside an [`EffectPipeline`].
#[derive(Debug)]
pub struct PipelineEffect {
    id: EffectId,
    index: usize,
    kind: EffectKind,
}

impl PipelineEffect {
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Position in processing order, as last reported by the native pipeline.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }

    pub fn category(&self) -> EffectCategory {
        self.kind.category()
    }
}

/// Ordered chain of effects on one media stream.
///
/// The native pipeline is authoritative for order. Every mutation is a
/// native call followed by [`resynchronize`](Self::resynchronize); the managed
/// list only gives callers typed access and a default position for new
/// effects. Mutation is single-threaded per stream; owners that share a
/// pipeline across threads put it behind a mutex.
///
/// A mutation native accepted but could not be reconciled afterwards is
/// reported as an error, and [`is_synchronized`](Self::is_synchronized) stays
/// false until a later [`resynchronize`](Self::resynchronize) succeeds.
#[derive(Debug)]
pub struct EffectPipeline<B: PipelineBackend> {
    backend: B,
    effects: Vec<PipelineEffect>,
    synchronized: bool,
    disposed: bool,
}

impl<B: PipelineBackend> EffectPipeline<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            effects: Vec::new(),
            synchronized: true,
            disposed: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Effects in ascending `index` order.
    pub fn effects(&self) -> &[PipelineEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether the managed order matched native order after the last mutation.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn get(&self, id: EffectId) -> Option<&PipelineEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    /// Index at which appending is always accepted: the current effect count.
    pub fn next_available_index(&self) -> usize {
        self.effects.len()
    }

    /// Insert an effect at `requested_index`.
    ///
    /// On native failure the effect is dropped and the list is untouched.
    /// If native accepted it but resynchronization then fails, the effect
    /// stays in the list at its requested index, since native holds it, and
    /// the resynchronization error is returned.
    pub fn insert(&mut self, mut kind: EffectKind, requested_index: usize) -> Result<EffectId, RuntimeError> {
        self.ensure_not_disposed()?;
        let category = kind.category();
        let id = self.backend.insert_effect(&mut kind, requested_index)?;

        // Walk back from the tail to the last entry at or before the new index.
        let position = self
            .effects
            .iter()
            .rposition(|e| e.index <= requested_index)
            .map_or(0, |p| p + 1);
        self.effects.insert(
            position,
            PipelineEffect {
                id,
                index: requested_index,
                kind,
            },
        );
        log::debug!("Inserted {:?} {} at index {}", category, id, requested_index);

        self.resynchronize_after("insert")?;
        Ok(id)
    }

    /// Move an effect to `new_index`.
    ///
    /// On failure the list is left as-is; retrying with
    /// [`next_available_index`](Self::next_available_index) is always safe.
    pub fn move_effect(&mut self, id: EffectId, new_index: usize) -> Result<(), RuntimeError> {
        self.ensure_not_disposed()?;
        self.backend.move_effect(id, new_index)?;
        self.resynchronize_after("move")
    }

    /// Remove an effect. On native failure the entry stays in place.
    pub fn remove(&mut self, id: EffectId) -> Result<(), RuntimeError> {
        self.ensure_not_disposed()?;
        if let Err(e) = self.backend.remove_effect(id) {
            log::debug!("Native remove of {} failed, keeping entry: {}", id, e);
            return Err(e);
        }
        self.resynchronize_after("remove")
    }

    /// Re-read native order and correct the managed list.
    ///
    /// Effects missing from a complete native enumeration are dropped; the
    /// rest take their native index and the list is re-sorted by it. If any
    /// query fails the list is left untouched: dropping an entry frees a
    /// custom effect native may still call.
    pub fn resynchronize(&mut self) -> Result<(), RuntimeError> {
        let native_index = match self.read_native_order() {
            Ok(order) => order,
            Err(e) => {
                self.synchronized = false;
                return Err(e);
            }
        };

        self.effects.retain_mut(|effect| match native_index.get(&effect.id) {
            Some(&index) => {
                effect.index = index;
                true
            }
            None => {
                log::debug!("{} no longer exists natively, dropping it", effect.id);
                false
            }
        });
        self.effects.sort_by_key(|e| e.index);
        self.synchronized = true;
        Ok(())
    }

    /// Read-only grouping of effects by category.
    pub fn effects_by_kind(&self) -> HashMap<EffectCategory, Vec<&PipelineEffect>> {
        let mut groups: HashMap<EffectCategory, Vec<&PipelineEffect>> = HashMap::new();
        for effect in &self.effects {
            groups.entry(effect.category()).or_default().push(effect);
        }
        groups
    }

    /// Custom effects of concrete type `T`, in pipeline order.
    pub fn custom_effects<T: CustomEffect + 'static>(&self) -> Vec<(EffectId, &T)> {
        self.effects
            .iter()
            .filter_map(|effect| match &effect.kind {
                EffectKind::Custom(slot) => slot.downcast_ref::<T>().map(|t| (effect.id, t)),
                _ => None,
            })
            .collect()
    }

    /// Remove every effect, natively when possible, then mark the pipeline disposed.
    ///
    /// Idempotent. Native removal failures are logged; the managed entries are
    /// dropped regardless because the stream is going away.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.backend.is_alive() {
            for effect in &self.effects {
                if let Err(e) = self.backend.remove_effect(effect.id) {
                    log::warn!("Failed to remove {} during disposal: {}", effect.id, e);
                }
            }
        }
        self.effects.clear();
    }

    fn read_native_order(&self) -> Result<HashMap<EffectId, usize>, RuntimeError> {
        let count = self.backend.effect_count()?;
        (0..count)
            .map(|index| self.backend.effect_id_at(index).map(|id| (id, index)))
            .collect()
    }

    fn resynchronize_after(&mut self, operation: &str) -> Result<(), RuntimeError> {
        self.resynchronize().map_err(|e| {
            log::warn!("Resynchronization after {} failed: {}", operation, e);
            e
        })
    }

    fn ensure_not_disposed(&self) -> Result<(), RuntimeError> {
        if self.disposed {
            return Err(RuntimeError::HandleNotAlive {
                kind: crate::models::state::HandleKind::Pipeline,
            });
        }
        Ok(())
    }
}

impl<B: PipelineBackend> Drop for EffectPipeline<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
