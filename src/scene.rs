//! The scene the renderer draws.
//!
//! [`Scene`] groups the model entities with the lights, fog, clear color and
//! fireflies. Single writer per field:
//!
//! | field          | written by                                  |
//! |----------------|---------------------------------------------|
//! | `world`, model | [`Scene::attach_model`] and the animation step |
//! | `lights.moon`  | the debug panel                             |
//! | `lights.camera_light.position` | the frame loop                |
//! | `fireflies`    | the frame loop                              |
//! | `fog`, `clear_color` | setup only                            |

use std::sync::Arc;

use crate::draw2d::Color;
use crate::ecs::{NodeIndex, PrimitiveId, RenderMesh, TextureId, WorldTransform};
use crate::fireflies::FireflySwarm;
use crate::lighting::{Fog, SceneLights};
use crate::mesh::Transform;
use crate::model::ModelData;

pub struct Scene {
    pub world: hecs::World,
    pub lights: SceneLights,
    pub fog: Fog,
    pub clear_color: Color,
    pub fireflies: FireflySwarm,
    model: Option<Arc<ModelData>>,
    /// Bumped on every attach so the renderer knows to re-upload.
    model_generation: u64,
    pose: Vec<Transform>,
}

impl Scene {
    pub fn new(lights: SceneLights, fog: Fog, clear_color: Color, fireflies: FireflySwarm) -> Self {
        Self {
            world: hecs::World::new(),
            lights,
            fog,
            clear_color,
            fireflies,
            model: None,
            model_generation: 0,
            pose: Vec::new(),
        }
    }

    /// Replace the model: one entity per primitive per node, posed at rest.
    pub fn attach_model(&mut self, model: Arc<ModelData>) {
        self.world.clear();

        for (node_index, node) in model.nodes.iter().enumerate() {
            for &primitive_index in &node.primitives {
                let Some(primitive) = model.primitives.get(primitive_index) else {
                    continue;
                };
                let [r, g, b, a] = primitive.base_color;
                let color = Color::rgba(r, g, b, a);
                let render = match primitive.texture.filter(|&t| t < model.images.len()) {
                    Some(t) => RenderMesh::with_texture(PrimitiveId(primitive_index), color, TextureId(t)),
                    None => RenderMesh::new(PrimitiveId(primitive_index), color),
                };
                self.world
                    .spawn((NodeIndex(node_index), WorldTransform::default(), render));
            }
        }

        self.pose = model.rest_pose();
        self.model = Some(model);
        self.model_generation += 1;
        self.update_world_transforms();
    }

    pub fn model(&self) -> Option<&Arc<ModelData>> {
        self.model.as_ref()
    }

    pub fn model_generation(&self) -> u64 {
        self.model_generation
    }

    pub fn pose(&self) -> &[Transform] {
        &self.pose
    }

    /// Per-node local transforms, written by the animation mixer.
    pub fn pose_mut(&mut self) -> &mut [Transform] {
        &mut self.pose
    }

    /// Recompute entity world matrices from the current pose.
    pub fn update_world_transforms(&mut self) {
        let Some(model) = &self.model else {
            return;
        };
        let matrices = model.world_matrices(&self.pose);
        for (_, (node, world)) in self
            .world
            .query_mut::<(&NodeIndex, &mut WorldTransform)>()
        {
            if let Some(m) = matrices.get(node.0) {
                world.0 = *m;
            }
        }
    }

    /// Number of drawable entities.
    pub fn renderable_count(&self) -> usize {
        self.world
            .query::<(&WorldTransform, &RenderMesh)>()
            .iter()
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::mesh::Vertex3d;
    use crate::model::{ModelNode, Primitive};
    use glam::Vec3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_node_model() -> ModelData {
        let triangle = RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        );
        ModelData {
            nodes: vec![
                ModelNode {
                    name: Some("root".into()),
                    parent: None,
                    children: vec![1],
                    local: Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
                    primitives: vec![0],
                },
                ModelNode {
                    name: Some("child".into()),
                    parent: Some(0),
                    children: Vec::new(),
                    local: Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
                    primitives: vec![0, 1],
                },
            ],
            roots: vec![0],
            primitives: vec![
                Primitive {
                    geometry: triangle.clone(),
                    base_color: [1.0; 4],
                    texture: None,
                },
                Primitive {
                    geometry: triangle,
                    base_color: [0.5, 0.5, 0.5, 1.0],
                    // Out of range, dropped on attach
                    texture: Some(3),
                },
            ],
            images: Vec::new(),
            clips: Vec::new(),
        }
    }

    fn empty_scene() -> Scene {
        let mut rng = StdRng::seed_from_u64(0);
        Scene::new(
            SceneLights::default(),
            Fog::default(),
            Color::hex(0x26333e),
            FireflySwarm::new(4, &mut rng),
        )
    }

    #[test]
    fn attach_spawns_one_entity_per_primitive() {
        let mut scene = empty_scene();
        assert_eq!(scene.model_generation(), 0);
        scene.attach_model(Arc::new(two_node_model()));
        assert_eq!(scene.renderable_count(), 3);
        assert_eq!(scene.model_generation(), 1);
        for (_, mesh) in scene.world.query::<&RenderMesh>().iter() {
            assert!(mesh.texture.is_none());
        }
    }

    #[test]
    fn world_transforms_follow_the_pose() {
        let mut scene = empty_scene();
        scene.attach_model(Arc::new(two_node_model()));

        let child_origin = |scene: &Scene| {
            scene
                .world
                .query::<(&NodeIndex, &WorldTransform)>()
                .iter()
                .find(|(_, (n, _))| n.0 == 1)
                .map(|(_, (_, w))| w.0.transform_point3(Vec3::ZERO))
        };
        assert_eq!(child_origin(&scene), Some(Vec3::new(1.0, 2.0, 0.0)));

        scene.pose_mut()[0].position = Vec3::ZERO;
        scene.update_world_transforms();
        assert_eq!(child_origin(&scene), Some(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn reattach_replaces_entities() {
        let mut scene = empty_scene();
        scene.attach_model(Arc::new(two_node_model()));
        scene.attach_model(Arc::new(two_node_model()));
        assert_eq!(scene.renderable_count(), 3);
        assert_eq!(scene.model_generation(), 2);
    }
}
