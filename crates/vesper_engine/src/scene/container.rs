//! Staged scene and its value snapshots

use super::entities::{Camera, Light, Model, Rectangle, Skybox, Sprite};
use super::object::{ObjectId, SceneObject};
use crate::foundation::math::{direction_between, Mat4};
use std::collections::{HashMap, HashSet};

/// Live entity registry mutated by the simulation and external threads
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) models: HashMap<ObjectId, SceneObject<Model>>,
    pub(crate) rectangles: HashMap<ObjectId, SceneObject<Rectangle>>,
    pub(crate) lights: HashMap<ObjectId, SceneObject<Light>>,
    pub(crate) sprites: HashMap<ObjectId, SceneObject<Sprite>>,
    pub(crate) removed_models: HashSet<ObjectId>,
    pub(crate) skyboxes: Vec<Skybox>,
    pub(crate) camera: Camera,
}

/// Draw record of one model, detached from its live entity
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    /// Identity of the live model this was copied from
    pub id: ObjectId,
    /// Model descriptor index
    pub descriptor: u32,
    /// Texture index, if textured
    pub texture: Option<u32>,
    /// World matrix (external matrix already applied)
    pub matrix: Mat4,
    /// Inner matrix as set on the live model
    pub inner_matrix: Mat4,
}

impl ModelData {
    fn capture(object: &SceneObject<Model>) -> Self {
        let model = object.read();
        Self {
            id: object.id(),
            descriptor: model.descriptor,
            texture: model.texture,
            matrix: model.world_matrix(),
            inner_matrix: model.params.inner_matrix,
        }
    }
}

/// By-value snapshot of a [`Scene`]
///
/// Stable once copied: nothing in it refers back to the live entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneContainer {
    /// Models
    pub models: Vec<ModelData>,
    /// Screen-space rectangles
    pub rectangles: Vec<Rectangle>,
    /// Lights
    pub lights: Vec<Light>,
    /// Sprites, already offset towards the camera
    pub sprites: Vec<Sprite>,
    /// Models removed since the previous snapshot
    pub removed_models: HashSet<ObjectId>,
    /// Skyboxes
    pub skyboxes: Vec<Skybox>,
    /// Camera
    pub camera: Camera,
}

impl SceneContainer {
    /// Overwrite this snapshot from the staged scene, reusing allocations
    ///
    /// Drains the staged removed-model set into this one. Removals pile up
    /// until the render side consumes them, so a frame that skips a tick
    /// still sees every removal.
    pub(crate) fn capture(&mut self, staged: &mut Scene) {
        self.camera = staged.camera;

        self.models.clear();
        self.models.extend(staged.models.values().map(ModelData::capture));

        self.rectangles.clear();
        self.rectangles
            .extend(staged.rectangles.values().map(SceneObject::snapshot));

        self.lights.clear();
        self.lights.extend(staged.lights.values().map(SceneObject::snapshot));

        let camera_position = staged.camera.position;
        self.sprites.clear();
        self.sprites.extend(staged.sprites.values().map(|object| {
            let mut sprite = object.snapshot();
            if let Some(towards_camera) = direction_between(&sprite.position, &camera_position) {
                sprite.position += towards_camera * sprite.offset;
            }
            sprite
        }));

        self.skyboxes.clone_from(&staged.skyboxes);

        self.removed_models.extend(staged.removed_models.drain());
    }
}
