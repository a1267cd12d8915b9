// ToneRegistry - set of currently sounding tones keyed by generated id
//
// All insertions go through `register` and all removals through `complete`,
// `silence_all` or pruning, each under the same mutex, so completion-triggered
// removal and bulk cancellation cannot interleave.
//
// A tone whose voice finished in the mixer is pruned on the next access even
// if its `play` caller stopped waiting, so dropped futures never hold a slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;

use super::tone::ToneRequest;
use super::voice::VoiceControl;
use crate::error::PlaybackError;

/// Identifier handed out per `play` call
pub type ToneId = u64;

struct ActiveTone {
    request: ToneRequest,
    control: Arc<VoiceControl>,
}

/// Registry of in-flight tones
pub struct ToneRegistry {
    next_id: AtomicU64,
    capacity: usize,
    tones: Mutex<HashMap<ToneId, ActiveTone>>,
}

impl ToneRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity,
            tones: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Track a new tone and return its id
    ///
    /// # Errors
    /// * `PlaybackError::QueueFull` - `capacity` tones already tracked
    /// * `PlaybackError::LockPoisoned` - registry mutex poisoned
    pub fn register(
        &self,
        request: ToneRequest,
        control: Arc<VoiceControl>,
    ) -> Result<ToneId, PlaybackError> {
        let mut tones = self.tones.lock().map_err(|_| PlaybackError::LockPoisoned {
            component: "tone_registry".to_string(),
        })?;
        prune_finished(&mut tones);
        if tones.len() >= self.capacity {
            return Err(PlaybackError::QueueFull {
                capacity: self.capacity,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tones.insert(id, ActiveTone { request, control });
        Ok(id)
    }

    /// Remove a tone that finished. Returns false if it was already removed.
    pub fn complete(&self, id: ToneId) -> bool {
        self.lock_tones().remove(&id).is_some()
    }

    /// Silence every tracked tone and clear the set
    ///
    /// Never fails: a poisoned lock is recovered so audio can always be cut.
    ///
    /// # Returns
    /// Number of tones silenced
    pub fn silence_all(&self) -> usize {
        let mut tones = self.lock_tones();
        prune_finished(&mut tones);
        for tone in tones.values() {
            tone.control.silence();
        }
        let count = tones.len();
        tones.clear();
        count
    }

    pub fn len(&self) -> usize {
        let mut tones = self.lock_tones();
        prune_finished(&mut tones);
        tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests of the tones currently tracked
    pub fn snapshot(&self) -> Vec<(ToneId, ToneRequest)> {
        let mut tones = self.lock_tones();
        prune_finished(&mut tones);
        let mut active: Vec<_> = tones.iter().map(|(id, t)| (*id, t.request)).collect();
        active.sort_by_key(|(id, _)| *id);
        active
    }

    fn lock_tones(&self) -> MutexGuard<'_, HashMap<ToneId, ActiveTone>> {
        self.tones.lock().unwrap_or_else(|poisoned| {
            warn!("[ToneRegistry] Recovering poisoned registry lock");
            poisoned.into_inner()
        })
    }
}

fn prune_finished(tones: &mut HashMap<ToneId, ActiveTone>) {
    tones.retain(|_, tone| !tone.control.is_finished());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::Channel;

    fn request() -> ToneRequest {
        ToneRequest::new(1000.0, Channel::Left, -20.0)
    }

    #[test]
    fn test_register_generates_unique_ids() {
        let registry = ToneRegistry::new(4);
        let a = registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        let b = registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_complete_removes_once() {
        let registry = ToneRegistry::new(4);
        let id = registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        assert!(registry.complete(id));
        assert!(!registry.complete(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_capacity_enforced() {
        let registry = ToneRegistry::new(1);
        registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        let err = registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap_err();
        assert_eq!(err, PlaybackError::QueueFull { capacity: 1 });
    }

    #[test]
    fn test_silence_all_on_empty_is_noop() {
        let registry = ToneRegistry::new(4);
        assert_eq!(registry.silence_all(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_silence_all_flags_every_tone() {
        let registry = ToneRegistry::new(4);
        let controls: Vec<_> = (0..3).map(|_| Arc::new(VoiceControl::new())).collect();
        for control in &controls {
            registry.register(request(), Arc::clone(control)).unwrap();
        }

        assert_eq!(registry.silence_all(), 3);
        assert!(registry.is_empty());
        assert!(controls.iter().all(|c| c.is_silenced()));
    }

    #[test]
    fn test_complete_after_silence_all_is_harmless() {
        let registry = ToneRegistry::new(4);
        let id = registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        registry.silence_all();
        assert!(!registry.complete(id));
    }

    #[test]
    fn test_finished_tones_are_pruned() {
        let registry = ToneRegistry::new(2);
        let first = Arc::new(VoiceControl::new());
        let second = Arc::new(VoiceControl::new());
        let first_id = registry.register(request(), Arc::clone(&first)).unwrap();
        registry.register(request(), Arc::clone(&second)).unwrap();

        // Nobody calls complete(): the audio side finishing is enough
        first.mark_finished();
        assert_eq!(registry.len(), 1);
        assert!(registry.snapshot().iter().all(|(id, _)| *id != first_id));

        second.mark_finished();
        registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        registry
            .register(request(), Arc::new(VoiceControl::new()))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }
}
