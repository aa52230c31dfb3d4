//! Backend without a GPU
//!
//! Tracks descriptor lifetimes and per-model uniforms in memory. Used by the
//! demo binary and by tests that exercise the frame loop end to end.

use super::backend::{FrameBackend, RenderError};
use crate::foundation::math::Mat4;
use crate::scene::{DescriptorFactory, DrawnState, ModelData, ObjectId, VertexData};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Descriptor created by [`HeadlessFactory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessModel {
    /// Number of vertices uploaded
    pub vertex_count: usize,
    /// Number of indices uploaded
    pub index_count: usize,
}

/// Creation and destruction counters shared by factory and backend
#[derive(Debug, Default)]
pub struct ResourceLedger {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl ResourceLedger {
    /// Descriptors created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Descriptors destroyed so far
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Descriptors currently alive
    pub fn live(&self) -> usize {
        self.created() - self.destroyed()
    }

    fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}

/// Descriptor factory for [`HeadlessBackend`]
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    ledger: Arc<ResourceLedger>,
}

impl DescriptorFactory for HeadlessFactory {
    type Descriptor = HeadlessModel;

    fn create_model(&self, data: &VertexData) -> Result<HeadlessModel, RenderError> {
        if data.is_empty() {
            return Err(RenderError::ResourceCreation("model has no indices".to_string()));
        }
        self.ledger.created.fetch_add(1, Ordering::AcqRel);
        Ok(HeadlessModel {
            vertex_count: data.vertices.len(),
            index_count: data.indices.len(),
        })
    }

    fn destroy_model(&self, _descriptor: HeadlessModel) {
        self.ledger.record_destroyed();
    }
}

/// In-memory frame backend
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    ledger: Arc<ResourceLedger>,
    uniforms: HashMap<ObjectId, Mat4>,
    frame_time: Option<Duration>,
    frames_submitted: u64,
    last_draw_count: usize,
}

impl HeadlessBackend {
    /// Create a backend with its own ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate GPU work by sleeping this long per submitted frame
    pub fn with_frame_time(mut self, frame_time: Duration) -> Self {
        self.frame_time = Some(frame_time);
        self
    }

    /// Factory whose descriptors this backend can destroy
    pub fn factory(&self) -> HeadlessFactory {
        HeadlessFactory {
            ledger: Arc::clone(&self.ledger),
        }
    }

    /// Shared creation/destruction counters
    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    /// Frames submitted so far
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Models with a descriptor in the last submitted frame
    pub fn last_draw_count(&self) -> usize {
        self.last_draw_count
    }

    /// Uniform matrix currently held for a model
    pub fn uniform(&self, model: ObjectId) -> Option<&Mat4> {
        self.uniforms.get(&model)
    }
}

impl FrameBackend for HeadlessBackend {
    type Descriptor = HeadlessModel;

    fn begin_frame(&mut self, _slot: usize) -> Result<(), RenderError> {
        Ok(())
    }

    fn release_model(&mut self, model: ObjectId) {
        self.uniforms.remove(&model);
    }

    fn update_model(&mut self, _slot: usize, model: &ModelData) {
        self.uniforms.insert(model.id, model.matrix);
    }

    fn record_and_submit(
        &mut self,
        _slot: usize,
        drawn: &DrawnState<HeadlessModel>,
    ) -> Result<(), RenderError> {
        self.last_draw_count = drawn
            .scene()
            .models
            .iter()
            .filter(|model| drawn.descriptor(model.descriptor).is_some())
            .count();
        self.frames_submitted += 1;

        if let Some(frame_time) = self.frame_time {
            thread::sleep(frame_time);
        }
        Ok(())
    }

    fn destroy_descriptor(&mut self, _descriptor: HeadlessModel) {
        self.ledger.record_destroyed();
    }

    fn wait_idle(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}
