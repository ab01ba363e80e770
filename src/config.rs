//! Viewer configuration.
//!
//! [`ViewerConfig`] carries every tunable constant of the scene. The defaults
//! reproduce the stock scene: a Game Boy model under moonlight, thirty
//! fireflies and looping background music.
//!
//! ```no_run
//! use firefly_viewer::ViewerConfig;
//!
//! let config = ViewerConfig::new()
//!     .title("Fireflies")
//!     .size(1600, 900)
//!     .asset_root("static")
//!     .fireflies(60)
//!     .seed(7);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::Vec3;

use crate::draw2d::Color;
use crate::lighting::{Fog, SceneLights};

/// Configuration for the viewer window and scene.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Directory the model and audio paths are resolved against.
    pub asset_root: PathBuf,
    pub model_path: PathBuf,
    pub audio_path: PathBuf,
    pub firefly_count: usize,
    /// Fixed RNG seed for reproducible firefly motion. `None` seeds from entropy.
    pub seed: Option<u64>,
    pub clear_color: Color,
    pub fog: Fog,
    pub lights: SceneLights,
    pub camera_position: Vec3,
    /// Vertical field of view in degrees.
    pub camera_fov: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub orbit_target: Vec3,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    /// How long the loading overlay takes to fade once the model is in.
    pub overlay_fade: Duration,
    pub music_volume: f32,
    pub music_looping: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Firefly Viewer".to_string(),
            width: 1280,
            height: 720,
            asset_root: PathBuf::from("."),
            model_path: PathBuf::from("models/GameBoy.gltf"),
            audio_path: PathBuf::from("audio/zeldaMusic.mp3"),
            firefly_count: 30,
            seed: None,
            clear_color: Color::hex(0x26333e),
            fog: Fog::default(),
            lights: SceneLights::default(),
            camera_position: Vec3::new(-2.0, 2.0, -5.0),
            camera_fov: 75.0,
            camera_near: 0.1,
            camera_far: 100.0,
            orbit_target: Vec3::new(0.0, 1.0, 0.0),
            // 45 to 72 degrees: keeps the camera from dipping under the model
            min_polar_angle: std::f32::consts::FRAC_PI_4,
            max_polar_angle: std::f32::consts::PI / 2.5,
            overlay_fade: Duration::from_secs(2),
            music_volume: 0.5,
            music_looping: true,
        }
    }
}

impl ViewerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_path = path.into();
        self
    }

    pub fn fireflies(mut self, count: usize) -> Self {
        self.firefly_count = count;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Model path joined onto the asset root.
    pub fn resolved_model_path(&self) -> PathBuf {
        resolve(&self.asset_root, &self.model_path)
    }

    /// Audio path joined onto the asset root.
    pub fn resolved_audio_path(&self) -> PathBuf {
        resolve(&self.asset_root, &self.audio_path)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_scene() {
        let config = ViewerConfig::default();
        assert_eq!(config.firefly_count, 30);
        assert_eq!(config.camera_position, Vec3::new(-2.0, 2.0, -5.0));
        assert_eq!(config.overlay_fade, Duration::from_secs(2));
        assert_eq!(config.music_volume, 0.5);
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let config = ViewerConfig::new().asset_root("static");
        assert_eq!(
            config.resolved_model_path(),
            Path::new("static").join("models/GameBoy.gltf")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let absolute = std::env::temp_dir().join("song.mp3");
        let config = ViewerConfig::new().asset_root("static").audio(&absolute);
        assert_eq!(config.resolved_audio_path(), absolute);
    }
}
