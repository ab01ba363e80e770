//! # Firefly Viewer
//!
//! A small 3D scene viewer: one glTF or STL model under moonlight and fog, a
//! light that follows the camera, a swarm of drifting fireflies, orbit camera
//! controls, background music and a debug panel for the moonlight.
//!
//! ```no_run
//! use firefly_viewer::{ViewerConfig, run};
//!
//! fn main() -> anyhow::Result<()> {
//!     run(ViewerConfig::new().asset_root("assets").seed(7))
//! }
//! ```
//!
//! Everything the frame loop touches lives in [`Viewer`], which holds no GPU
//! state; [`Renderer`] draws it. The viewer can be stepped without a window:
//!
//! ```
//! use std::time::Instant;
//! use firefly_viewer::{Viewer, ViewerConfig, Viewport};
//!
//! let mut viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(800.0, 600.0, 1.0));
//! viewer.update(Instant::now());
//! assert_eq!(viewer.scene.lights.camera_light.position, viewer.camera.position);
//! ```

mod animation;
mod app;
mod assets;
mod audio;
mod blit;
mod camera;
mod clock;
mod config;
mod debug_panel;
mod draw2d;
mod ecs;
mod error;
mod firefly_pass;
mod fireflies;
mod geometry;
mod gpu;
mod input;
mod lighting;
mod loader;
mod mesh;
mod mesh_pass;
mod model;
mod orbit_controls;
mod overlay;
mod render_target;
mod renderer;
mod scene;
mod texture;
mod viewer;

pub use animation::{
    AnimationAction, AnimationClip, AnimationMixer, Channel, ChannelValues, Interpolation,
};
pub use app::run;
pub use assets::{Assets, FontAtlas, FontId, GlyphInfo};
pub use audio::{AudioTrack, BackgroundMusic};
pub use blit::BlitPass;
pub use camera::PerspectiveCamera;
pub use clock::{FrameClock, FrameTime};
pub use config::ViewerConfig;
pub use debug_panel::{Control, DebugPanel, PanelAction, PanelResponse, SliderBinding};
pub use draw2d::{Color, Draw2d, Vertex2d};
pub use ecs::{NodeIndex, PrimitiveId, RenderMesh, TextureId, WorldTransform};
pub use error::{AssetError, AudioError, GpuError};
pub use firefly_pass::{FireflyInstance, FireflyPass};
pub use fireflies::{BOUNDS, FireflySwarm, wrap_coordinate};
pub use geometry::RawGeometry;
pub use gpu::GpuContext;
pub use input::Input;
pub use lighting::{AmbientLight, DirectionalLight, Fog, LightUniforms, PointLight, SceneLights};
pub use loader::AssetLoad;
pub use mesh::{Mesh, Transform, Vertex3d};
pub use mesh_pass::{FrameUniforms, MeshPass, ModelUniforms};
pub use model::{ImageData, ModelData, ModelNode, Primitive, load_model};
pub use orbit_controls::{OrbitControls, Spherical};
pub use overlay::LoadingOverlay;
pub use render_target::RenderTarget;
pub use renderer::Renderer;
pub use scene::Scene;
pub use texture::Texture;
pub use viewer::{Viewer, Viewport};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
