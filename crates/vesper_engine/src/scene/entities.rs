//! Draw data of the entities a scene is made of

use crate::foundation::math::{Mat4, Vec3};
use parking_lot::RwLock;
use std::sync::Arc;

/// Matrix owned elsewhere (a parent transform, a physics body) and read at submit
pub type SharedMatrix = Arc<RwLock<Mat4>>;

/// Transform state of a model
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// Local model matrix
    pub matrix: Mat4,
    /// Extra matrix handed to the renderer untouched
    pub inner_matrix: Mat4,
    /// Optional parent transform, applied as `external * matrix` at submit
    pub external_matrix: Option<SharedMatrix>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            matrix: Mat4::identity(),
            inner_matrix: Mat4::identity(),
            external_matrix: None,
        }
    }
}

/// Instance of a loaded model descriptor
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Index returned by the model loader
    pub descriptor: u32,
    /// Texture index, if textured
    pub texture: Option<u32>,
    /// Transforms
    pub params: ModelParams,
}

impl Model {
    /// Model drawing the given descriptor with identity transforms
    pub fn new(descriptor: u32) -> Self {
        Self {
            descriptor,
            ..Self::default()
        }
    }

    /// Set the local matrix
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.params.matrix = matrix;
        self
    }

    /// Set the inner matrix
    pub fn with_inner_matrix(mut self, matrix: Mat4) -> Self {
        self.params.inner_matrix = matrix;
        self
    }

    /// Attach a parent transform
    pub fn with_external_matrix(mut self, matrix: SharedMatrix) -> Self {
        self.params.external_matrix = Some(matrix);
        self
    }

    /// Local matrix composed with the external matrix, if any
    pub fn world_matrix(&self) -> Mat4 {
        match &self.params.external_matrix {
            Some(external) => *external.read() * self.params.matrix,
            None => self.params.matrix,
        }
    }
}

/// Screen-space quad in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    /// Top-left corner
    pub position: [f32; 2],
    /// Width and height
    pub size: [f32; 2],
    /// Draw order, lower is closer
    pub depth: f32,
    /// RGBA tint
    pub color: [f32; 4],
    /// Texture index, if textured
    pub texture: Option<u32>,
}

impl Default for Rectangle {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            size: [0.0, 0.0],
            depth: 0.0,
            color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
        }
    }
}

/// Point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// World position
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Falloff radius
    pub radius: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            color: Vec3::new(1.0, 1.0, 1.0),
            radius: 10.0,
        }
    }
}

/// Camera-facing billboard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// World position
    pub position: Vec3,
    /// Distance the sprite is pulled towards the camera at submit
    pub offset: f32,
    /// World-space width and height
    pub size: [f32; 2],
    /// Texture index
    pub texture: u32,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            offset: 0.0,
            size: [1.0, 1.0],
            texture: 0,
        }
    }
}

/// Cube-map background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Skybox {
    /// Cube texture index
    pub texture: u32,
}

/// View parameters copied verbatim at submit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Eye position
    pub position: Vec3,
    /// View direction
    pub direction: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_matrix_without_parent() {
        let local = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let model = Model::new(1).with_matrix(local);
        assert_relative_eq!(model.world_matrix(), local);
    }

    #[test]
    fn test_world_matrix_follows_parent() {
        let parent: SharedMatrix = Arc::new(RwLock::new(Mat4::new_scaling(2.0)));
        let local = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));
        let model = Model::new(1)
            .with_matrix(local)
            .with_external_matrix(Arc::clone(&parent));

        assert_relative_eq!(model.world_matrix(), Mat4::new_scaling(2.0) * local);

        *parent.write() = Mat4::identity();
        assert_relative_eq!(model.world_matrix(), local);
    }
}
