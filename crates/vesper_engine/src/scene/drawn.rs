//! Render-thread view of the scene

use super::container::SceneContainer;
use super::messages::{LoadFailedMessage, LoadModelMessage, ReleaseMessage, RemoveModelMessage};
use std::collections::{HashMap, HashSet};

/// Descriptor waiting for the GPU to stop referencing it
#[derive(Debug)]
pub struct PendingDeletion<D> {
    descriptor: D,
    marked_slot: Option<usize>,
}

impl<D> PendingDeletion<D> {
    /// Frame slot recorded when this deletion was first seen, if any
    pub fn marked_slot(&self) -> Option<usize> {
        self.marked_slot
    }
}

/// Everything the frame loop renders from
///
/// Owned by the render thread and only touched between frames, so reading it
/// while recording needs no lock.
#[derive(Debug)]
pub struct DrawnState<D> {
    pub(crate) scene: SceneContainer,
    descriptors: HashMap<u32, D>,
    delete_on_arrival: HashSet<u32>,
    pending_deletions: Vec<PendingDeletion<D>>,
}

impl<D> Default for DrawnState<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DrawnState<D> {
    /// Empty state
    pub fn new() -> Self {
        Self {
            scene: SceneContainer::default(),
            descriptors: HashMap::new(),
            delete_on_arrival: HashSet::new(),
            pending_deletions: Vec::new(),
        }
    }

    /// Scene snapshot of the current frame
    pub fn scene(&self) -> &SceneContainer {
        &self.scene
    }

    /// Live descriptor for a model index
    pub fn descriptor(&self, index: u32) -> Option<&D> {
        self.descriptors.get(&index)
    }

    /// All live descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = (u32, &D)> {
        self.descriptors.iter().map(|(&index, descriptor)| (index, descriptor))
    }

    /// Number of live descriptors
    pub fn loaded_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Deletions waiting for their frame slot to come around
    pub fn pending_deletions(&self) -> &[PendingDeletion<D>] {
        &self.pending_deletions
    }

    /// True when an unload arrived before the matching load
    pub fn is_deleted_on_arrival(&self, index: u32) -> bool {
        self.delete_on_arrival.contains(&index)
    }

    /// Install a loaded descriptor, or retire it straight away if its unload came first
    pub(crate) fn receive_load(&mut self, message: LoadModelMessage<D>) {
        if self.delete_on_arrival.remove(&message.index) {
            log::trace!("Model {} unloaded before it arrived", message.index);
            self.schedule_deletion(message.descriptor);
        } else if let Some(previous) = self.descriptors.insert(message.index, message.descriptor) {
            log::warn!("Model {} loaded twice, retiring the older descriptor", message.index);
            self.schedule_deletion(previous);
        }
    }

    /// Retire a live descriptor, or remember the index until its load arrives
    pub(crate) fn receive_unload(&mut self, message: RemoveModelMessage) {
        match self.descriptors.remove(&message.index) {
            Some(descriptor) => self.schedule_deletion(descriptor),
            None => {
                self.delete_on_arrival.insert(message.index);
            }
        }
    }

    /// Forget an unload that was waiting for a load which will never come
    pub(crate) fn receive_load_failed(&mut self, message: LoadFailedMessage) {
        if self.delete_on_arrival.remove(&message.index) {
            log::trace!("Model {} failed to load after it was unloaded", message.index);
        }
    }

    pub(crate) fn receive_release(&mut self, message: ReleaseMessage) {
        match message {
            ReleaseMessage::Removed(message) => self.receive_unload(message),
            ReleaseMessage::LoadFailed(message) => self.receive_load_failed(message),
        }
    }

    fn schedule_deletion(&mut self, descriptor: D) {
        self.pending_deletions.push(PendingDeletion {
            descriptor,
            marked_slot: None,
        });
    }

    /// Advance deferred deletions for the frame slot about to be recorded
    ///
    /// Entries marked with `slot` were last referenced by the frame that used
    /// this slot before, whose fence has just been waited on, so they are
    /// handed to `destroy`. Unmarked entries are marked with `slot`.
    pub fn retire(&mut self, slot: usize, mut destroy: impl FnMut(D)) {
        let mut i = 0;
        while i < self.pending_deletions.len() {
            match self.pending_deletions[i].marked_slot {
                Some(marked) if marked == slot => {
                    let pending = self.pending_deletions.swap_remove(i);
                    destroy(pending.descriptor);
                }
                Some(_) => i += 1,
                None => {
                    self.pending_deletions[i].marked_slot = Some(slot);
                    i += 1;
                }
            }
        }
    }

    /// Take every live and pending descriptor, leaving the state empty
    pub fn drain_all(&mut self) -> Vec<D> {
        self.delete_on_arrival.clear();
        self.descriptors
            .drain()
            .map(|(_, descriptor)| descriptor)
            .chain(self.pending_deletions.drain(..).map(|pending| pending.descriptor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(index: u32, descriptor: &'static str) -> LoadModelMessage<&'static str> {
        LoadModelMessage { index, descriptor }
    }

    #[test]
    fn test_load_then_unload() {
        let mut state = DrawnState::new();
        state.receive_load(load(1, "a"));
        assert_eq!(state.descriptor(1), Some(&"a"));

        state.receive_unload(RemoveModelMessage { index: 1 });
        assert_eq!(state.descriptor(1), None);
        assert_eq!(state.pending_deletions().len(), 1);
    }

    #[test]
    fn test_unload_before_load_skips_install() {
        let mut state = DrawnState::new();
        state.receive_unload(RemoveModelMessage { index: 4 });
        assert!(state.is_deleted_on_arrival(4));

        state.receive_load(load(4, "late"));
        assert_eq!(state.descriptor(4), None);
        assert!(!state.is_deleted_on_arrival(4));
        assert_eq!(state.pending_deletions().len(), 1);
    }

    #[test]
    fn test_failed_load_clears_waiting_unload() {
        let mut state: DrawnState<&'static str> = DrawnState::new();
        state.receive_release(ReleaseMessage::Removed(RemoveModelMessage { index: 6 }));
        assert!(state.is_deleted_on_arrival(6));

        state.receive_release(ReleaseMessage::LoadFailed(LoadFailedMessage { index: 6 }));
        assert!(!state.is_deleted_on_arrival(6));
        assert!(state.pending_deletions().is_empty());
    }

    #[test]
    fn test_retire_waits_for_slot_to_come_around() {
        let mut state = DrawnState::new();
        state.receive_load(load(1, "a"));
        state.receive_unload(RemoveModelMessage { index: 1 });

        let mut destroyed = Vec::new();
        state.retire(0, |d| destroyed.push(d));
        assert!(destroyed.is_empty());
        assert_eq!(state.pending_deletions()[0].marked_slot(), Some(0));

        state.retire(1, |d| destroyed.push(d));
        assert!(destroyed.is_empty());

        state.retire(0, |d| destroyed.push(d));
        assert_eq!(destroyed, vec!["a"]);
        assert!(state.pending_deletions().is_empty());
    }

    #[test]
    fn test_drain_all_collects_live_and_pending() {
        let mut state = DrawnState::new();
        state.receive_load(load(1, "live"));
        state.receive_load(load(2, "gone"));
        state.receive_unload(RemoveModelMessage { index: 2 });
        state.receive_unload(RemoveModelMessage { index: 3 });

        let mut drained = state.drain_all();
        drained.sort_unstable();
        assert_eq!(drained, vec!["gone", "live"]);
        assert_eq!(state.loaded_count(), 0);
        assert!(!state.is_deleted_on_arrival(3));
    }
}
