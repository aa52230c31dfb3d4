//! Scene data and its handoff to the renderer
//!
//! - [`SceneObject`]: shared handle to a live entity
//! - [`SceneBridge`]: staged → submitted → drawn snapshots
//! - [`DrawnState`]: the render thread's copy plus its descriptor table
//! - [`ModelLoader`]: asynchronous descriptor creation

mod bridge;
mod container;
mod drawn;
mod entities;
mod loader;
mod mesh;
mod messages;
mod object;

pub use bridge::{BridgeError, SceneBridge};
pub use container::{ModelData, SceneContainer};
pub use drawn::{DrawnState, PendingDeletion};
pub use entities::{Camera, Light, Model, ModelParams, Rectangle, SharedMatrix, Skybox, Sprite};
pub use loader::{DescriptorFactory, LoadMode, ModelLoader};
pub use mesh::{Vertex, VertexData};
pub use messages::{LoadFailedMessage, LoadModelMessage, ReleaseMessage, RemoveModelMessage};
pub use object::{ObjectId, SceneObject};
