// cache.rs
// Per-owner, per-context slot table with dirty-flag invalidation.
//
// Every GPU-backed object (shader, geometry, texture) owns one of these so a
// single CPU-side object can be bound against several contexts at once.

use std::collections::HashMap;

use crate::gpu::ContextId;

/// Staleness of one named field in one context. `Unset` reads as dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldState {
    #[default]
    Unset,
    Dirty,
    Fresh,
}

#[derive(Debug, Default)]
pub struct ContextSlot<S> {
    pub data: S,
    fields: HashMap<&'static str, FieldState>,
}

#[derive(Debug)]
pub struct ContextCache<S> {
    slots: HashMap<ContextId, ContextSlot<S>>,
    active: Option<ContextId>,
}

impl<S: Default> ContextCache<S> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            active: None,
        }
    }

    /// Selects the slot for `context`, creating it on first use.
    pub fn use_context(&mut self, context: ContextId) {
        self.slots.entry(context).or_default();
        self.active = Some(context);
    }

    pub fn active_context(&self) -> Option<ContextId> {
        self.active
    }

    pub fn get(&self) -> Option<&S> {
        self.active_slot().map(|slot| &slot.data)
    }

    /// Mutable access to the active slot's data. Selects context 0 if none is active.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.active_slot_mut().data
    }

    pub fn put(&mut self, data: S) {
        self.active_slot_mut().data = data;
    }

    pub fn get_context(&self, context: ContextId) -> Option<&S> {
        self.slots.get(&context).map(|slot| &slot.data)
    }

    /// Marks `field` stale in the active context.
    pub fn dirty(&mut self, field: &'static str) {
        self.active_slot_mut()
            .fields
            .insert(field, FieldState::Dirty);
    }

    /// Marks `field` stale in every known context. Unknown contexts are
    /// already dirty by absence.
    pub fn dirty_all(&mut self, field: &'static str) {
        for slot in self.slots.values_mut() {
            slot.fields.insert(field, FieldState::Dirty);
        }
    }

    pub fn is_dirty(&self, field: &'static str) -> bool {
        self.field_state(field) != FieldState::Fresh
    }

    pub fn field_state(&self, field: &'static str) -> FieldState {
        self.active_slot()
            .and_then(|slot| slot.fields.get(field).copied())
            .unwrap_or_default()
    }

    /// Clears staleness of `field` for the active context only.
    pub fn fresh(&mut self, field: &'static str) {
        self.active_slot_mut()
            .fields
            .insert(field, FieldState::Fresh);
    }

    pub fn delete_context(&mut self, context: ContextId) {
        self.take_context(context);
    }

    /// Removes the slot for `context` and hands its data back so the owner can
    /// release GPU handles.
    pub fn take_context(&mut self, context: ContextId) -> Option<S> {
        if self.active == Some(context) {
            self.active = None;
        }
        self.slots.remove(&context).map(|slot| slot.data)
    }

    pub fn contexts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn active_slot(&self) -> Option<&ContextSlot<S>> {
        self.active.and_then(|id| self.slots.get(&id))
    }

    fn active_slot_mut(&mut self) -> &mut ContextSlot<S> {
        let id = *self.active.get_or_insert(0);
        self.slots.entry(id).or_default()
    }
}

impl<S: Default> Default for ContextCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Slot {
        handle: Option<u32>,
    }

    #[test]
    fn never_written_field_is_dirty() {
        let mut cache: ContextCache<Slot> = ContextCache::new();
        assert!(cache.is_dirty("program"));
        cache.use_context(1);
        assert!(cache.is_dirty("program"));
        assert_eq!(cache.field_state("program"), FieldState::Unset);
    }

    #[test]
    fn fresh_only_affects_active_context() {
        let mut cache: ContextCache<Slot> = ContextCache::new();
        cache.use_context(1);
        cache.fresh("program");
        assert!(!cache.is_dirty("program"));

        cache.use_context(2);
        assert!(cache.is_dirty("program"));

        cache.use_context(1);
        assert!(!cache.is_dirty("program"));
    }

    #[test]
    fn dirty_versus_dirty_all() {
        let mut cache: ContextCache<Slot> = ContextCache::new();
        for id in [1, 2] {
            cache.use_context(id);
            cache.fresh("program");
            cache.fresh("buffers");
        }

        cache.use_context(2);
        cache.dirty("program");
        assert!(cache.is_dirty("program"));
        cache.use_context(1);
        assert!(!cache.is_dirty("program"));

        cache.dirty_all("buffers");
        assert!(cache.is_dirty("buffers"));
        cache.use_context(2);
        assert!(cache.is_dirty("buffers"));
        assert_eq!(cache.field_state("buffers"), FieldState::Dirty);
    }

    #[test]
    fn put_get_are_scoped_per_context() {
        let mut cache: ContextCache<Slot> = ContextCache::new();
        cache.use_context(1);
        cache.put(Slot { handle: Some(7) });
        cache.use_context(2);
        assert_eq!(cache.get(), Some(&Slot::default()));
        cache.get_mut().handle = Some(9);

        assert_eq!(cache.get_context(1).and_then(|s| s.handle), Some(7));
        assert_eq!(cache.get_context(2).and_then(|s| s.handle), Some(9));
    }

    #[test]
    fn delete_context_reclaims_slot_and_resets_state() {
        let mut cache: ContextCache<Slot> = ContextCache::new();
        cache.use_context(3);
        cache.put(Slot { handle: Some(1) });
        cache.fresh("program");

        let taken = cache.take_context(3);
        assert_eq!(taken, Some(Slot { handle: Some(1) }));
        assert!(cache.is_empty());
        assert_eq!(cache.active_context(), None);

        cache.use_context(3);
        assert!(cache.is_dirty("program"));
        assert_eq!(cache.get(), Some(&Slot::default()));
    }
}
