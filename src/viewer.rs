//! Application state and the per-frame update.
//!
//! [`Viewer`] owns everything the frame loop touches. It has no GPU state, so
//! the whole update can run headless; the renderer only reads from it.
//!
//! Single writer per field:
//!
//! | field                     | written by                               |
//! |---------------------------|------------------------------------------|
//! | `camera`                  | [`Viewer::update`] (orbit step), [`Viewer::resize`] (aspect) |
//! | `controls`                | [`Viewer::process_input`], [`Viewer::update`] |
//! | `scene.lights.moon`       | the debug panel in [`Viewer::process_input`] |
//! | `scene.lights.camera_light` | [`Viewer::update`]                     |
//! | `scene.fireflies`         | [`Viewer::update`]                       |
//! | `scene` model entities    | [`Viewer::poll_assets`], [`Viewer::update`] (animation) |
//! | `overlay`                 | [`Viewer::poll_assets`], [`Viewer::update`] |
//! | `music`                   | [`Viewer::poll_assets`], the debug panel |
//! | `viewport`                | [`Viewer::resize`]                       |

use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::animation::AnimationMixer;
use crate::audio::{AudioTrack, BackgroundMusic};
use crate::camera::PerspectiveCamera;
use crate::clock::{FrameClock, FrameTime};
use crate::config::ViewerConfig;
use crate::debug_panel::{DebugPanel, PanelAction, PanelResponse};
use crate::draw2d::Color;
use crate::fireflies::FireflySwarm;
use crate::input::Input;
use crate::loader::AssetLoad;
use crate::model::{ModelData, load_model};
use crate::orbit_controls::OrbitControls;
use crate::overlay::LoadingOverlay;
use crate::scene::Scene;

/// Window size in logical pixels plus the display's pixel density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    /// Highest pixel ratio the renderer draws at.
    pub const MAX_PIXEL_RATIO: f32 = 2.0;

    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Build from a physical window size and its scale factor.
    pub fn from_physical(width: u32, height: u32, scale_factor: f64) -> Self {
        let scale = scale_factor.max(f64::EPSILON);
        Self::new(
            (f64::from(width) / scale) as f32,
            (f64::from(height) / scale) as f32,
            scale as f32,
        )
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Device pixel ratio capped at [`MAX_PIXEL_RATIO`](Self::MAX_PIXEL_RATIO).
    pub fn pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio.min(Self::MAX_PIXEL_RATIO)
    }

    /// Size of the off-screen drawing buffer in pixels, at least 1x1.
    pub fn drawing_buffer(&self) -> (u32, u32) {
        let ratio = self.pixel_ratio();
        (
            ((self.width * ratio).floor() as u32).max(1),
            ((self.height * ratio).floor() as u32).max(1),
        )
    }
}

pub struct Viewer {
    config: ViewerConfig,
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub panel: DebugPanel,
    pub overlay: LoadingOverlay,
    pub music: BackgroundMusic,
    mixer: Option<AnimationMixer>,
    model_load: Option<AssetLoad<ModelData>>,
    audio_load: Option<AssetLoad<AudioTrack>>,
    clock: FrameClock,
    rng: StdRng,
    viewport: Viewport,
    frame: FrameTime,
}

impl Viewer {
    /// Assemble the scene. Assets are not loaded until [`start_loading`](Self::start_loading).
    pub fn new(config: ViewerConfig, viewport: Viewport) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let fireflies = FireflySwarm::new(config.firefly_count, &mut rng);
        let scene = Scene::new(config.lights, config.fog, config.clear_color, fireflies);

        let mut camera = PerspectiveCamera::new(
            config.camera_fov,
            viewport.aspect(),
            config.camera_near,
            config.camera_far,
        )
        .at(config.camera_position);
        camera.look_at(config.orbit_target);

        let controls = OrbitControls::new()
            .target(config.orbit_target)
            .damping(0.05)
            .polar_limits(config.min_polar_angle, config.max_polar_angle);

        let overlay = LoadingOverlay::new(Color::BLACK, config.overlay_fade);
        let music = BackgroundMusic::detached(config.music_volume, config.music_looping);

        log::debug!(
            "scene assembled: {} fireflies, viewport {}x{} @{}",
            config.firefly_count,
            viewport.width,
            viewport.height,
            viewport.device_pixel_ratio
        );

        Self {
            config,
            scene,
            camera,
            controls,
            panel: DebugPanel::new(),
            overlay,
            music,
            mixer: None,
            model_load: None,
            audio_load: None,
            clock: FrameClock::new(),
            rng,
            viewport,
            frame: FrameTime::default(),
        }
    }

    /// Play music on the default output device instead of silently.
    pub fn with_audio(mut self) -> Self {
        self.music = BackgroundMusic::new(self.config.music_volume, self.config.music_looping);
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Start the model and music loads on worker threads.
    pub fn start_loading(&mut self) {
        let model_path = self.config.resolved_model_path();
        log::info!("loading model {}", model_path.display());
        self.model_load = Some(AssetLoad::spawn("model", move || load_model(&model_path)));

        let audio_path = self.config.resolved_audio_path();
        log::info!("loading music {}", audio_path.display());
        self.audio_load = Some(AssetLoad::spawn("music", move || AudioTrack::load(&audio_path)));
    }

    /// Pick up finished loads. Call once per event-loop iteration.
    pub fn poll_assets(&mut self) {
        if let Some(load) = &mut self.model_load
            && load.poll()
        {
            if let Some(model) = load.take() {
                self.attach_model(model);
            } else if let Some(e) = load.error() {
                log::error!("error loading the 3D model: {e}");
            }
        }

        if let Some(load) = &mut self.audio_load
            && load.poll()
        {
            if let Some(track) = load.take() {
                self.music.set_track(track);
                self.music.play();
            } else if let Some(e) = load.error() {
                log::error!("error loading music: {e}");
            }
        }
    }

    fn attach_model(&mut self, model: ModelData) {
        log::info!(
            "model attached: {} primitives, {} clips",
            model.primitives.len(),
            model.clips.len()
        );
        let clips = model.clips.clone();
        self.scene.attach_model(Arc::new(model));
        self.mixer = (!clips.is_empty()).then(|| AnimationMixer::new(clips));
        self.overlay.start_fade();
    }

    pub fn model_load(&self) -> Option<&AssetLoad<ModelData>> {
        self.model_load.as_ref()
    }

    pub fn audio_load(&self) -> Option<&AssetLoad<AudioTrack>> {
        self.audio_load.as_ref()
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    /// Route this frame's input to the debug panel, then to the orbit controls.
    pub fn process_input(&mut self, input: &Input) -> PanelResponse {
        let viewport = self.viewport;
        let response = if self.controls.is_dragging() {
            PanelResponse::default()
        } else {
            self.panel.handle_input(
                input,
                viewport.device_pixel_ratio,
                viewport.width,
                &mut self.scene.lights,
            )
        };

        match response.action {
            Some(PanelAction::PlayAudio) => self.music.play(),
            Some(PanelAction::StopAudio) => self.music.stop(),
            None => {}
        }

        if !response.captured {
            let physical_height = viewport.height * viewport.device_pixel_ratio;
            self.controls
                .handle_input(input, &self.camera, physical_height);
        }
        response
    }

    /// Apply a new window size. Takes effect before the next render.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.camera.aspect = viewport.aspect();
        self.camera.update_projection_matrix();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Timing of the most recent update.
    pub fn frame_time(&self) -> FrameTime {
        self.frame
    }

    /// Advance the scene by one frame.
    pub fn update(&mut self, now: Instant) -> FrameTime {
        let time = self.clock.tick(now);
        self.frame = time;

        if let Some(mixer) = &mut self.mixer {
            mixer.update(time.delta, self.scene.pose_mut());
            self.scene.update_world_transforms();
        }

        self.scene.fireflies.update(&mut self.rng);

        // Orbit first, so the light sits exactly on the rendered camera
        self.controls.update(&mut self.camera);
        self.scene.lights.camera_light.position = self.camera.position;

        self.overlay.update(time.delta);
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use glam::Vec3;
    use std::time::Duration;

    #[test]
    fn pixel_ratio_is_capped_at_two() {
        let vp = Viewport::new(800.0, 600.0, 3.0);
        assert_eq!(vp.pixel_ratio(), 2.0);
        assert_eq!(vp.drawing_buffer(), (1600, 1200));
        let vp = Viewport::new(801.5, 600.0, 1.0);
        assert_eq!(vp.drawing_buffer(), (801, 600));
    }

    #[test]
    fn from_physical_divides_by_scale() {
        let vp = Viewport::from_physical(2560, 1440, 2.0);
        assert_eq!(vp, Viewport::new(1280.0, 720.0, 2.0));
    }

    #[test]
    fn initial_camera_follows_config() {
        let viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(1280.0, 720.0, 1.0));
        assert_eq!(viewer.camera.position, Vec3::new(-2.0, 2.0, -5.0));
        assert!((viewer.camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
        assert_eq!(viewer.scene.fireflies.len(), 30);
    }

    #[test]
    fn panel_capture_blocks_orbit() {
        use winit::event::MouseButton;

        let mut viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(1280.0, 720.0, 1.0));
        let mut input = Input::new();
        // Inside the panel's first control row
        input.move_cursor(glam::Vec2::new(1280.0 - 130.0, 36.0));
        input.press(MouseButton::Left);
        let response = viewer.process_input(&input);
        assert!(response.captured);
        assert!(!viewer.controls.is_dragging());
    }

    #[test]
    fn update_advances_overlay_only_after_attach() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(640.0, 480.0, 1.0));
        let t0 = Instant::now();
        viewer.update(t0);
        viewer.update(t0 + Duration::from_secs(3));
        assert_eq!(viewer.overlay.opacity(), 1.0);
        viewer.attach_model(ModelData::default());
        viewer.update(t0 + Duration::from_secs(4));
        assert!((viewer.overlay.opacity() - 0.5).abs() < 1e-4);
        viewer.update(t0 + Duration::from_secs(5));
        assert!(!viewer.overlay.is_visible());
    }

    fn run_frames(viewer: &mut Viewer, frames: u32, mut each: impl FnMut(&Viewer)) {
        let t0 = Instant::now();
        for i in 0..frames {
            viewer.update(t0 + Duration::from_millis(16 * u64::from(i)));
            each(viewer);
        }
    }

    #[test]
    fn fireflies_stay_in_bounds_for_a_thousand_frames() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(42), Viewport::new(800.0, 600.0, 1.0));
        assert_eq!(viewer.scene.fireflies.len(), 30);
        assert!(
            viewer
                .scene
                .fireflies
                .speeds()
                .iter()
                .all(|s| (0.01..=0.05).contains(s))
        );

        run_frames(&mut viewer, 1000, |v| {
            for p in v.scene.fireflies.positions() {
                for c in p.to_array() {
                    assert!((-5.0..5.0).contains(&c), "coordinate {c} out of bounds");
                }
            }
        });
    }

    #[test]
    fn firefly_steps_are_small_except_at_the_wrap() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(9), Viewport::new(800.0, 600.0, 1.0));
        let speeds = viewer.scene.fireflies.speeds().to_vec();
        let mut previous = viewer.scene.fireflies.positions().to_vec();

        run_frames(&mut viewer, 500, |v| {
            let current = v.scene.fireflies.positions();
            for ((before, after), speed) in previous.iter().zip(current).zip(&speeds) {
                for (a, b) in before.to_array().into_iter().zip(after.to_array()) {
                    let d = (b - a).abs();
                    let wrapped = d > 9.0;
                    assert!(wrapped || d <= 0.1 * speed * 0.5 + 1e-6, "jump of {d}");
                }
            }
            previous = current.to_vec();
        });
    }

    #[test]
    fn camera_light_tracks_camera_every_frame() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(3), Viewport::new(800.0, 600.0, 1.0));
        viewer.controls.rotate_left(0.3);
        viewer.controls.rotate_up(-0.2);
        viewer.controls.dolly(1.2);
        run_frames(&mut viewer, 120, |v| {
            assert_eq!(v.scene.lights.camera_light.position, v.camera.position);
        });
    }

    #[test]
    fn resize_updates_aspect_and_drawing_buffer() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(800.0, 600.0, 1.0));
        viewer.resize(Viewport::new(1000.0, 500.0, 3.0));
        assert!((viewer.camera.aspect - 2.0).abs() < 1e-6);
        assert_eq!(viewer.viewport().pixel_ratio(), 2.0);
        assert_eq!(viewer.viewport().drawing_buffer(), (2000, 1000));

        viewer.resize(Viewport::new(640.0, 480.0, 1.5));
        assert!((viewer.camera.aspect - 640.0 / 480.0).abs() < 1e-6);
        assert_eq!(viewer.viewport().drawing_buffer(), (960, 720));
    }

    #[test]
    fn intensity_slider_value_reads_back_exactly() {
        let mut viewer = Viewer::new(ViewerConfig::new().seed(1), Viewport::new(800.0, 600.0, 1.0));
        for v in [0.0, 0.12, 3.5, 7.25, 10.0] {
            assert!(viewer.panel.set(&mut viewer.scene.lights, "intensity", v));
            viewer.update(Instant::now());
            assert_eq!(viewer.scene.lights.moon.intensity, v);
        }
    }

    #[test]
    fn missing_model_keeps_overlay_and_keeps_running() {
        let config = ViewerConfig::new()
            .seed(5)
            .asset_root("definitely/not/here")
            .model("missing.gltf")
            .audio("missing.mp3");
        let mut viewer = Viewer::new(config, Viewport::new(800.0, 600.0, 1.0));
        viewer.start_loading();

        let deadline = Instant::now() + Duration::from_secs(5);
        while viewer.model_load().is_some_and(|l| l.is_pending()) && Instant::now() < deadline {
            viewer.poll_assets();
            std::thread::sleep(Duration::from_millis(1));
        }
        viewer.poll_assets();

        assert!(matches!(
            viewer.model_load().and_then(|l| l.error()),
            Some(AssetError::Io { .. })
        ));
        run_frames(&mut viewer, 200, |v| {
            assert!(v.overlay.is_visible());
            assert_eq!(v.overlay.opacity(), 1.0);
        });
        assert!(viewer.scene.model().is_none());
        assert_eq!(viewer.scene.renderable_count(), 0);
        assert!(!viewer.music.is_playing());
    }
}
