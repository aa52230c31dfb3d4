//! Asynchronous model loading
//!
//! Descriptors are created on a dedicated loader thread and reach the render
//! thread through the bridge's load queue. Model indices are allocated here,
//! before the descriptor exists, so callers can reference a model right away.

use super::bridge::{BridgeError, SceneBridge};
use super::mesh::VertexData;
use crate::render::RenderError;
use crate::scheduler::{SchedulerError, TaskScheduler};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Creates and destroys GPU model descriptors
pub trait DescriptorFactory: Send + Sync + 'static {
    /// Descriptor type handed to the render thread
    type Descriptor: Send + 'static;

    /// Upload geometry and return its descriptor. Runs on the loader thread.
    fn create_model(&self, data: &VertexData) -> Result<Self::Descriptor, RenderError>;

    /// Release a descriptor that never reached the render thread
    fn destroy_model(&self, descriptor: Self::Descriptor);
}

/// Whether `load_model` returns before the descriptor is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Return immediately; the descriptor shows up in a later frame
    Async,
    /// Return once the descriptor has been queued for the render thread
    Blocking,
}

#[derive(Debug, Default)]
struct ModelIndices {
    last: u32,
    used: HashSet<u32>,
}

impl ModelIndices {
    fn allocate(&mut self) -> u32 {
        loop {
            self.last = self.last.wrapping_add(1);
            if self.last != 0 && self.used.insert(self.last) {
                return self.last;
            }
        }
    }

    fn release(&mut self, index: u32) -> bool {
        self.used.remove(&index)
    }
}

/// Undo the allocation of a model whose descriptor could not be created
///
/// If the owner already unloaded the index, its unload is waiting on the
/// render thread for a load that will never arrive. Holding the index lock
/// orders the failure notice after that unload in the shared queue.
fn abandon_index<D>(indices: &Mutex<ModelIndices>, bridge: &SceneBridge<D>, index: u32) {
    let mut indices = indices.lock();
    if indices.release(index) {
        return;
    }

    if let Err(err) = bridge.push_load_failed(index) {
        log::error!("Could not report failed load of model {index}: {err}");
    }
}

/// Front end for loading and unloading models
pub struct ModelLoader<F: DescriptorFactory> {
    factory: Arc<F>,
    bridge: Arc<SceneBridge<F::Descriptor>>,
    indices: Arc<Mutex<ModelIndices>>,
    worker: TaskScheduler,
}

impl<F: DescriptorFactory> ModelLoader<F> {
    /// Start the loader thread
    pub fn new(factory: Arc<F>, bridge: Arc<SceneBridge<F::Descriptor>>) -> Result<Self, SchedulerError> {
        Ok(Self {
            factory,
            bridge,
            indices: Arc::new(Mutex::new(ModelIndices::default())),
            worker: TaskScheduler::named("vesper-loader", 1)?,
        })
    }

    /// Allocate a model index and create its descriptor on the loader thread
    ///
    /// A failed creation releases the index again. Blocking loads report the
    /// failure; async loads only log it.
    pub fn load_model(&self, data: VertexData, mode: LoadMode) -> Result<u32, RenderError> {
        let index = self.indices.lock().allocate();
        let factory = Arc::clone(&self.factory);
        let bridge = Arc::clone(&self.bridge);
        let indices = Arc::clone(&self.indices);
        let (outcome_tx, outcome_rx) = crossbeam::channel::bounded(1);

        let task = self.worker.enqueue_waitable(move || {
            let outcome = factory.create_model(&data).and_then(|descriptor| {
                bridge.push_load(index, descriptor).map_err(|descriptor| {
                    factory.destroy_model(descriptor);
                    RenderError::ResourceCreation("model load queue is full".to_string())
                })
            });

            if let Err(err) = &outcome {
                log::error!("Failed to load model {index}: {err}");
                abandon_index(&indices, &bridge, index);
            }

            // Async callers have already dropped the receiver.
            let _ = outcome_tx.send(outcome);
        });

        match mode {
            LoadMode::Async => Ok(index),
            LoadMode::Blocking => {
                self.worker.wait(task);
                outcome_rx
                    .try_recv()
                    .unwrap_or_else(|_| {
                        Err(RenderError::ResourceCreation(format!(
                            "loader stopped before model {index} was created"
                        )))
                    })
                    .map(|()| index)
            }
        }
    }

    /// Release a model index; its descriptor is destroyed once no frame uses it
    ///
    /// Unloading an index that is not allocated, including one whose load
    /// already failed, only logs a warning.
    pub fn unload_model(&self, index: u32) -> Result<(), BridgeError> {
        let mut indices = self.indices.lock();
        if !indices.used.contains(&index) {
            log::warn!("Unloading model {index}, which is not loaded");
            return Ok(());
        }

        self.bridge.push_unload(index)?;
        indices.release(index);
        Ok(())
    }

    /// True while `index` is allocated
    pub fn is_allocated(&self, index: u32) -> bool {
        self.indices.lock().used.contains(&index)
    }

    /// Block until every queued load has been processed
    pub fn flush(&self) {
        self.worker.wait_all();
    }

    /// Bridge the descriptors are delivered to
    pub fn bridge(&self) -> &Arc<SceneBridge<F::Descriptor>> {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::scene::DrawnState;

    #[derive(Default)]
    struct FakeFactory {
        destroyed: Mutex<Vec<usize>>,
    }

    impl DescriptorFactory for FakeFactory {
        type Descriptor = usize;

        fn create_model(&self, data: &VertexData) -> Result<usize, RenderError> {
            if data.is_empty() {
                Err(RenderError::ResourceCreation("empty geometry".to_string()))
            } else {
                Ok(data.vertices.len())
            }
        }

        fn destroy_model(&self, descriptor: usize) {
            self.destroyed.lock().push(descriptor);
        }
    }

    fn loader(capacity: usize) -> ModelLoader<FakeFactory> {
        let bridge = Arc::new(SceneBridge::new(&BridgeConfig {
            message_queue_capacity: capacity,
        }));
        ModelLoader::new(Arc::new(FakeFactory::default()), bridge).unwrap()
    }

    #[test]
    fn test_blocking_load_is_queued_on_return() {
        let loader = loader(16);
        let index = loader.load_model(VertexData::quad(), LoadMode::Blocking).unwrap();
        assert_eq!(index, 1);

        let mut drawn = DrawnState::new();
        loader.bridge().load_to_drawn(&mut drawn);
        assert_eq!(drawn.descriptor(index), Some(&4));
    }

    #[test]
    fn test_async_loads_arrive_after_flush() {
        let loader = loader(16);
        let indices: Vec<_> = (0..5)
            .map(|_| loader.load_model(VertexData::quad(), LoadMode::Async).unwrap())
            .collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        loader.flush();
        let mut drawn = DrawnState::new();
        loader.bridge().load_to_drawn(&mut drawn);
        assert_eq!(drawn.loaded_count(), 5);
    }

    #[test]
    fn test_unload_retires_descriptor() {
        let loader = loader(16);
        let index = loader.load_model(VertexData::quad(), LoadMode::Async).unwrap();
        loader.unload_model(index).unwrap();
        assert!(!loader.is_allocated(index));

        loader.flush();
        let mut drawn = DrawnState::new();
        loader.bridge().load_to_drawn(&mut drawn);
        assert_eq!(drawn.descriptor(index), None);
        assert_eq!(drawn.pending_deletions().len(), 1);
    }

    #[test]
    fn test_failed_blocking_load_is_reported() {
        let loader = loader(16);
        let result = loader.load_model(VertexData::default(), LoadMode::Blocking);
        assert!(matches!(result, Err(RenderError::ResourceCreation(_))));
        assert!(!loader.is_allocated(1));

        let mut drawn = DrawnState::new();
        loader.bridge().load_to_drawn(&mut drawn);
        assert_eq!(drawn.loaded_count(), 0);
    }

    #[test]
    fn test_unload_after_failed_load_leaves_nothing_waiting() {
        let loader = loader(16);
        assert!(loader.load_model(VertexData::default(), LoadMode::Blocking).is_err());
        loader.unload_model(1).unwrap();

        let mut drawn = DrawnState::new();
        for _ in 0..100 {
            loader.bridge().load_to_drawn(&mut drawn);
        }
        assert!(!drawn.is_deleted_on_arrival(1));
    }

    #[test]
    fn test_unload_before_async_failure_is_cleared() {
        let loader = loader(16);
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();
        let blocker = Arc::clone(&gate);
        loader.worker.enqueue_waitable(move || drop(blocker.lock()));

        let index = loader.load_model(VertexData::default(), LoadMode::Async).unwrap();
        loader.unload_model(index).unwrap();
        assert!(!loader.is_allocated(index));

        let mut drawn = DrawnState::new();
        loader.bridge().load_to_drawn(&mut drawn);
        assert!(drawn.is_deleted_on_arrival(index));

        drop(held);
        loader.flush();
        loader.bridge().load_to_drawn(&mut drawn);
        assert!(!drawn.is_deleted_on_arrival(index));
        assert_eq!(drawn.loaded_count(), 0);
    }

    #[test]
    fn test_overflowing_load_is_destroyed() {
        let loader = loader(1);
        let first = loader.load_model(VertexData::quad(), LoadMode::Blocking).unwrap();
        let second = loader.load_model(VertexData::quad(), LoadMode::Blocking);

        assert!(second.is_err());
        assert!(loader.is_allocated(first));
        assert!(!loader.is_allocated(first + 1));
        assert_eq!(*loader.factory.destroyed.lock(), vec![4]);
    }

    #[test]
    fn test_index_allocation_skips_used() {
        let mut indices = ModelIndices {
            last: u32::MAX - 1,
            ..ModelIndices::default()
        };
        indices.used.extend([u32::MAX, 1]);

        assert_eq!(indices.allocate(), 2);
        assert!(indices.release(2));
        assert!(!indices.release(2));
    }
}
