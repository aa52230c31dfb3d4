//! Shared handles to live scene entities

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scene entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Live entity shared between its owner and the staged scene
///
/// Clones share the same data and identity. The staged scene keeps a clone
/// for as long as the entity is registered; everything downstream of
/// `submit` works on value copies.
pub struct SceneObject<T> {
    id: ObjectId,
    data: Arc<RwLock<T>>,
}

impl<T> SceneObject<T> {
    /// Wrap a value with a fresh identity
    pub fn new(value: T) -> Self {
        Self {
            id: ObjectId::next(),
            data: Arc::new(RwLock::new(value)),
        }
    }

    /// Identity of this entity
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Read the current state
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.data.read()
    }

    /// Mutate the state; the change is picked up by the next submit
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.data.write()
    }
}

impl<T: Clone> SceneObject<T> {
    /// Copy of the current state
    pub fn snapshot(&self) -> T {
        self.data.read().clone()
    }
}

impl<T> Clone for SceneObject<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> PartialEq for SceneObject<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for SceneObject<T> {}

impl<T> Hash for SceneObject<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SceneObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("id", &self.id)
            .field("data", &*self.data.read())
            .finish()
    }
}
