//! Triple-buffered handoff between the simulation and render threads
//!
//! ```text
//!  external / simulation          simulation (tick end)        render (frame start)
//!  ──────────────────────        ─────────────────────        ────────────────────
//!  register_* / remove_*  ──▶  staged ──submit()──▶  submitted ──load_to_drawn()──▶  drawn
//!        (ext lock)                (ext + scene lock)             (scene lock)
//! ```
//!
//! The staged scene holds shared handles to live entities. `submit` copies
//! them by value into the submitted container; `load_to_drawn` copies that
//! into the render thread's [`DrawnState`], which is then read without any
//! lock until the next frame. Model descriptors arrive through two message
//! rings drained by `load_to_drawn` as well.

use super::container::{Scene, SceneContainer};
use super::drawn::DrawnState;
use super::entities::{Camera, Light, Model, Rectangle, Skybox, Sprite};
use super::messages::{LoadFailedMessage, LoadModelMessage, ReleaseMessage, RemoveModelMessage};
use super::object::SceneObject;
use crate::config::BridgeConfig;
use crate::foundation::ring_buffer::{InsertMode, RingBuffer};
use crate::input::InputSource;
use crate::simulation::SceneSubmitter;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Scene bridge errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// A message ring is full; the render thread is not draining it
    #[error("{queue} message queue is full (capacity {capacity})")]
    QueueFull {
        /// Which queue overflowed
        queue: &'static str,
        /// Its fixed capacity
        capacity: usize,
    },
}

/// Scene snapshots plus the model descriptor message queues
pub struct SceneBridge<D> {
    // Lock order: `staged` before `submitted`.
    staged: Mutex<Scene>,
    submitted: Mutex<SceneContainer>,
    load_messages: RingBuffer<LoadModelMessage<D>>,
    unload_messages: RingBuffer<ReleaseMessage>,
    input: Option<Arc<dyn InputSource>>,
}

impl<D> SceneBridge<D> {
    /// Create an empty bridge
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            staged: Mutex::new(Scene::default()),
            submitted: Mutex::new(SceneContainer::default()),
            load_messages: RingBuffer::new(config.message_queue_capacity, InsertMode::Locked),
            unload_messages: RingBuffer::new(config.message_queue_capacity, InsertMode::Locked),
            input: None,
        }
    }

    /// Poll `input` after every submit
    ///
    /// Polling happens on the simulation thread. A source whose platform
    /// pins event processing to the main thread, such as GLFW on macOS,
    /// skips those polls and has to be polled from the main thread instead.
    pub fn with_input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    /// Add a model to the staged scene
    pub fn register_model(&self, model: &SceneObject<Model>) {
        self.staged.lock().models.insert(model.id(), model.clone());
    }

    /// Remove a model and report its removal to the render side
    pub fn remove_model(&self, model: &SceneObject<Model>) {
        let mut staged = self.staged.lock();
        staged.models.remove(&model.id());
        staged.removed_models.insert(model.id());
    }

    /// Add a screen-space rectangle
    pub fn register_rectangle(&self, rectangle: &SceneObject<Rectangle>) {
        self.staged.lock().rectangles.insert(rectangle.id(), rectangle.clone());
    }

    /// Remove a screen-space rectangle
    pub fn remove_rectangle(&self, rectangle: &SceneObject<Rectangle>) {
        self.staged.lock().rectangles.remove(&rectangle.id());
    }

    /// Add a light
    pub fn register_light(&self, light: &SceneObject<Light>) {
        self.staged.lock().lights.insert(light.id(), light.clone());
    }

    /// Remove a light
    pub fn remove_light(&self, light: &SceneObject<Light>) {
        self.staged.lock().lights.remove(&light.id());
    }

    /// Add a sprite
    pub fn register_sprite(&self, sprite: &SceneObject<Sprite>) {
        self.staged.lock().sprites.insert(sprite.id(), sprite.clone());
    }

    /// Remove a sprite
    pub fn remove_sprite(&self, sprite: &SceneObject<Sprite>) {
        self.staged.lock().sprites.remove(&sprite.id());
    }

    /// Replace the staged camera
    pub fn set_camera(&self, camera: Camera) {
        self.staged.lock().camera = camera;
    }

    /// Replace the skybox list
    pub fn set_skyboxes(&self, skyboxes: Vec<Skybox>) {
        self.staged.lock().skyboxes = skyboxes;
    }

    /// Number of registered models
    pub fn model_count(&self) -> usize {
        self.staged.lock().models.len()
    }

    /// Publish the staged scene as the submitted snapshot
    ///
    /// Runs on the simulation thread at the end of every tick.
    pub fn submit(&self) {
        {
            let mut staged = self.staged.lock();
            let mut submitted = self.submitted.lock();
            submitted.capture(&mut staged);
        }

        if let Some(input) = &self.input {
            input.poll_events();
        }
    }

    /// Queue a loaded descriptor for the render thread
    ///
    /// Hands the descriptor back when the queue is full so the caller can
    /// destroy it.
    pub fn push_load(&self, index: u32, descriptor: D) -> Result<(), D> {
        self.load_messages
            .insert(LoadModelMessage { index, descriptor })
            .map_err(|message| message.descriptor)
    }

    /// Queue the release of a model index
    pub fn push_unload(&self, index: u32) -> Result<(), BridgeError> {
        self.push_release(ReleaseMessage::Removed(RemoveModelMessage { index }))
    }

    /// Tell the render thread no descriptor will arrive for a released index
    ///
    /// Shares the unload queue, so it is applied after any unload of the
    /// same index queued before it.
    pub fn push_load_failed(&self, index: u32) -> Result<(), BridgeError> {
        self.push_release(ReleaseMessage::LoadFailed(LoadFailedMessage { index }))
    }

    fn push_release(&self, message: ReleaseMessage) -> Result<(), BridgeError> {
        self.unload_messages.insert(message).map_err(|_| BridgeError::QueueFull {
            queue: "unload",
            capacity: self.unload_messages.capacity(),
        })
    }

    /// Copy the submitted snapshot into `drawn` and apply pending descriptor messages
    ///
    /// Runs on the render thread once per frame. Only the scene lock is
    /// taken, so this never waits on entity registration.
    pub fn load_to_drawn(&self, drawn: &mut DrawnState<D>) {
        {
            let mut submitted = self.submitted.lock();
            drawn.scene.clone_from(&submitted);
            submitted.removed_models.clear();
        }

        for message in self.load_messages.drain() {
            drawn.receive_load(message);
        }

        for message in self.unload_messages.drain() {
            drawn.receive_release(message);
        }
    }
}

impl<D: Send> SceneSubmitter for SceneBridge<D> {
    fn submit(&self) {
        SceneBridge::submit(self);
    }
}
