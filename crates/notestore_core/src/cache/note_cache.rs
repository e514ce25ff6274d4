//! Least-recently-used note cache with pin-based eviction exemption.
//!
//! # Responsibility
//! - Keep at most `threshold` unpinned notes resident.
//! - Track recency for unpinned entries and evict the oldest first.
//! - Hand out scoped `PinGuard`s that exempt a note from capacity eviction.
//!
//! # Invariants
//! - `len() <= threshold` whenever no resident entry is pinned.
//! - Pinned entries are never evicted by capacity pressure; explicit
//!   `remove` still drops them.
//! - Pinned entries are absent from the recency order and re-enter it as
//!   most-recently-used when their last pin is released.
//! - A pin may precede residency; the entry is born pinned when inserted.

use crate::model::note::{Note, NoteId};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cached note body shared between the cache and pinned callers.
pub type SharedNote = Arc<RwLock<Note>>;

#[derive(Debug, Default)]
struct RecencyList {
    ticks: HashMap<NoteId, u64>,
    order: BTreeMap<u64, NoteId>,
    next_tick: u64,
}

impl RecencyList {
    fn touch(&mut self, id: NoteId) {
        self.remove(id);
        let tick = self.next_tick;
        self.next_tick += 1;
        self.ticks.insert(id, tick);
        self.order.insert(tick, id);
    }

    fn remove(&mut self, id: NoteId) {
        if let Some(tick) = self.ticks.remove(&id) {
            self.order.remove(&tick);
        }
    }

    fn oldest_except(&self, skip: Option<NoteId>) -> Option<NoteId> {
        self.order
            .values()
            .copied()
            .find(|id| Some(*id) != skip)
    }

    fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }
}

#[derive(Debug)]
struct CacheState {
    threshold: usize,
    entries: HashMap<NoteId, SharedNote>,
    pins: HashMap<NoteId, usize>,
    recency: RecencyList,
}

impl CacheState {
    fn is_pinned(&self, id: NoteId) -> bool {
        self.pins.contains_key(&id)
    }

    fn promote(&mut self, id: NoteId) {
        if !self.is_pinned(id) {
            self.recency.touch(id);
        }
    }

    fn insert(&mut self, note: Note) -> SharedNote {
        let id = note.id;
        let shared = Arc::new(RwLock::new(note));
        self.entries.insert(id, Arc::clone(&shared));
        self.promote(id);
        self.evict(Some(id));
        shared
    }

    /// Evicts least-recently-used unpinned entries until the bound holds.
    /// `skip` protects the entry whose insertion triggered the pass.
    fn evict(&mut self, skip: Option<NoteId>) {
        while self.entries.len() > self.threshold {
            let Some(victim) = self.recency.oldest_except(skip) else {
                warn!(
                    "event=note_evict module=note_cache status=skipped reason=all_pinned size={} threshold={}",
                    self.entries.len(),
                    self.threshold
                );
                return;
            };
            self.recency.remove(victim);
            self.entries.remove(&victim);
            debug!(
                "event=note_evict module=note_cache status=ok note_id={} size={} threshold={}",
                victim,
                self.entries.len(),
                self.threshold
            );
        }
    }
}

/// Thread-safe note cache handle. Clones share one cache.
#[derive(Debug, Clone)]
pub struct NoteCache {
    state: Arc<Mutex<CacheState>>,
}

impl NoteCache {
    /// Creates an empty cache bounded by `threshold` unpinned entries.
    pub fn new(threshold: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                threshold,
                entries: HashMap::new(),
                pins: HashMap::new(),
                recency: RecencyList::default(),
            })),
        }
    }

    /// Returns the resident note and promotes it, if present.
    pub fn get(&self, id: NoteId) -> Option<SharedNote> {
        let mut state = self.state.lock();
        let shared = state.entries.get(&id).cloned()?;
        state.promote(id);
        Some(shared)
    }

    /// Returns the resident note, or materializes it with `load` and inserts
    /// it.
    ///
    /// `load` runs without the cache lock held; when a concurrent caller
    /// populated the entry first, that entry wins and the loaded copy is
    /// dropped.
    pub fn get_or_load<E>(
        &self,
        id: NoteId,
        load: impl FnOnce() -> Result<Note, E>,
    ) -> Result<SharedNote, E> {
        if let Some(shared) = self.get(id) {
            return Ok(shared);
        }

        let note = load()?;
        let mut state = self.state.lock();
        if let Some(shared) = state.entries.get(&id).cloned() {
            state.promote(id);
            return Ok(shared);
        }
        debug!("event=note_load module=note_cache status=ok note_id={id}");
        Ok(state.insert(note))
    }

    /// Inserts or replaces the entry for `note.id` as most-recently-used.
    ///
    /// Replacement swaps the shared body; holders of the previous body keep
    /// their (now detached) copy.
    pub fn put(&self, note: Note) -> SharedNote {
        self.state.lock().insert(note)
    }

    /// Drops the entry regardless of pin state. Returns whether it was
    /// resident.
    pub fn remove(&self, id: NoteId) -> bool {
        let mut state = self.state.lock();
        state.recency.remove(id);
        let removed = state.entries.remove(&id).is_some();
        state.evict(None);
        removed
    }

    /// Returns the resident note without touching recency.
    ///
    /// The cache lock is released before returning, so callers may lock the
    /// body without blocking other cache operations.
    pub fn peek(&self, id: NoteId) -> Option<SharedNote> {
        self.state.lock().entries.get(&id).cloned()
    }

    /// Pins `id` until the returned guard drops.
    pub fn pin(&self, id: NoteId) -> PinGuard {
        let mut state = self.state.lock();
        *state.pins.entry(id).or_insert(0) += 1;
        state.recency.remove(id);
        PinGuard {
            cache: self.clone(),
            id,
        }
    }

    fn unpin(&self, id: NoteId) {
        let mut state = self.state.lock();
        let Some(count) = state.pins.get_mut(&id) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        state.pins.remove(&id);
        if state.entries.contains_key(&id) {
            state.recency.touch(id);
        }
        state.evict(None);
    }

    /// Drops every resident entry. Pins stay registered.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    /// Returns whether `id` is resident, pinned or not.
    pub fn contains(&self, id: NoteId) -> bool {
        self.state.lock().entries.contains_key(&id)
    }

    /// Number of live pins on `id`.
    pub fn pin_count(&self, id: NoteId) -> usize {
        self.state.lock().pins.get(&id).copied().unwrap_or(0)
    }

    /// Number of resident entries, pinned ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns whether no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity `T` for unpinned entries.
    pub fn threshold(&self) -> usize {
        self.state.lock().threshold
    }
}

/// Scoped eviction exemption for one note.
///
/// Releases its pin on drop, including unwinding and early returns.
#[must_use = "the pin is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PinGuard {
    cache: NoteCache,
    id: NoteId,
}

impl PinGuard {
    /// Note held by this guard.
    pub fn id(&self) -> NoteId {
        self.id
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.cache.unpin(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::NoteCache;
    use crate::model::note::Note;

    fn note(i: usize) -> Note {
        Note::new(format!("/prod/note{i}"), format!("body {i}"))
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = NoteCache::new(2);
        let a = note(0);
        let b = note(1);
        let c = note(2);
        cache.put(a.clone());
        cache.put(b.clone());
        // Touch `a` so `b` becomes the oldest.
        cache.get(a.id).unwrap();
        cache.put(c.clone());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(a.id));
        assert!(!cache.contains(b.id));
        assert!(cache.contains(c.id));
    }

    #[test]
    fn pinned_entries_survive_capacity_pressure() {
        let cache = NoteCache::new(1);
        let a = note(0);
        let guard = cache.pin(a.id);
        cache.put(a.clone());
        let b = note(1);
        cache.put(b.clone());

        // `a` is pinned and `b` triggered the pass, so nothing is evictable.
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.pin_count(a.id), 1);

        drop(guard);
        // Unpinning re-enters `a` as most-recent and evicts `b`.
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(a.id));
        assert_eq!(cache.pin_count(a.id), 0);
    }

    #[test]
    fn nested_pins_release_on_last_guard() {
        let cache = NoteCache::new(1);
        let a = note(0);
        cache.put(a.clone());
        let first = cache.pin(a.id);
        let second = cache.pin(a.id);
        assert_eq!(cache.pin_count(a.id), 2);

        drop(first);
        cache.put(note(1));
        assert!(cache.contains(a.id));

        drop(second);
        assert_eq!(cache.pin_count(a.id), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_ignores_pins() {
        let cache = NoteCache::new(4);
        let a = note(0);
        cache.put(a.clone());
        let _guard = cache.pin(a.id);

        assert!(cache.remove(a.id));
        assert!(!cache.contains(a.id));
        assert!(!cache.remove(a.id));
    }

    #[test]
    fn get_or_load_populates_once() {
        let cache = NoteCache::new(4);
        let a = note(0);
        let loaded = cache
            .get_or_load(a.id, || Ok::<_, ()>(a.clone()))
            .unwrap();
        assert_eq!(loaded.read().path, a.path);

        let again = cache
            .get_or_load(a.id, || -> Result<crate::model::note::Note, ()> {
                panic!("cached entry must not reload")
            })
            .unwrap();
        assert!(std::sync::Arc::ptr_eq(&loaded, &again));
    }

    #[test]
    fn get_or_load_propagates_loader_error() {
        let cache = NoteCache::new(4);
        let a = note(0);
        let err = cache.get_or_load(a.id, || Err("missing")).unwrap_err();
        assert_eq!(err, "missing");
        assert!(cache.is_empty());
    }

    #[test]
    fn peek_does_not_promote() {
        let cache = NoteCache::new(2);
        let a = note(0);
        let b = note(1);
        let shared = cache.put(a.clone());
        cache.put(b.clone());

        let peeked = cache.peek(a.id).unwrap();
        assert!(std::sync::Arc::ptr_eq(&shared, &peeked));
        assert!(cache.peek(note(2).id).is_none());

        // `a` is still the oldest entry, so it is the one evicted.
        cache.put(note(3));
        assert!(!cache.contains(a.id));
        assert!(cache.contains(b.id));
    }
}
