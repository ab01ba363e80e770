//! ECS components for model rendering.
//!
//! Every primitive of the loaded model becomes one `hecs` entity carrying a
//! [`NodeIndex`], a [`WorldTransform`] and a [`RenderMesh`]. The scene keeps
//! the world transforms current; the renderer draws every entity that has a
//! world transform and a render mesh.
//!
//! ```ignore
//! for (_, (world, mesh)) in scene.world.query::<(&WorldTransform, &RenderMesh)>().iter() {
//!     // draw mesh.primitive with world.0
//! }
//! ```

use glam::Mat4;

use crate::draw2d::Color;

/// Index of a primitive in the loaded model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveId(pub(crate) usize);

impl PrimitiveId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an image in the loaded model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Model node an entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeIndex(pub usize);

/// Model-to-world matrix of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTransform(pub Mat4);

impl Default for WorldTransform {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

/// What to draw for an entity.
#[derive(Clone, Copy, Debug)]
pub struct RenderMesh {
    pub primitive: PrimitiveId,
    /// Base color factor, multiplied with the texture.
    pub color: Color,
    /// Base color texture. If `None`, the color is used alone.
    pub texture: Option<TextureId>,
}

impl RenderMesh {
    pub fn new(primitive: PrimitiveId, color: Color) -> Self {
        Self {
            primitive,
            color,
            texture: None,
        }
    }

    pub fn with_texture(primitive: PrimitiveId, color: Color, texture: TextureId) -> Self {
        Self {
            primitive,
            color,
            texture: Some(texture),
        }
    }
}
