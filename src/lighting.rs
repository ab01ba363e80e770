//! Scene lights and fog.
//!
//! The scene has three lights: a flat ambient term, a directional "moon" light
//! whose intensity and position are exposed on the debug panel, and a point
//! light that follows the camera every frame.

use glam::Vec3;

use crate::draw2d::Color;

/// Uniform ambient light.
#[derive(Clone, Copy, Debug)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// A directional light shining from `position` toward `target`.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl DirectionalLight {
    /// Unit vector pointing from the lit surface toward the light.
    pub fn to_light(&self) -> Vec3 {
        (self.position - self.target).normalize_or(Vec3::Y)
    }
}

/// A point light with inverse-square falloff.
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    /// Falloff exponent, 2.0 for physically based falloff.
    pub decay: f32,
}

/// Linear distance fog.
#[derive(Clone, Copy, Debug)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            color: Color::hex(0x262837),
            near: 1.0,
            far: 15.0,
        }
    }
}

impl Fog {
    /// Fog blend factor at the given view depth (0 = clear, 1 = fully fogged).
    pub fn factor(&self, depth: f32) -> f32 {
        let t = ((depth - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// Every light in the scene.
///
/// Single writer per field: the debug panel writes `moon`, the frame loop
/// writes `camera_light.position`.
#[derive(Clone, Copy, Debug)]
pub struct SceneLights {
    pub ambient: AmbientLight,
    pub moon: DirectionalLight,
    pub camera_light: PointLight,
}

impl Default for SceneLights {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: Color::hex(0x555555),
                intensity: 1.0,
            },
            moon: DirectionalLight {
                color: Color::hex(0xb9d5ff),
                intensity: 0.12,
                position: Vec3::new(4.0, 5.0, -2.0),
                target: Vec3::ZERO,
            },
            camera_light: PointLight {
                color: Color::WHITE,
                intensity: 1.0,
                position: Vec3::ZERO,
                decay: 2.0,
            },
        }
    }
}

/// Light data as laid out for the mesh shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    /// Ambient color premultiplied by intensity.
    pub ambient: [f32; 4],
    /// Direction toward the moon (xyz).
    pub moon_direction: [f32; 4],
    /// Moon color premultiplied by intensity.
    pub moon_color: [f32; 4],
    /// Point light position (xyz).
    pub point_position: [f32; 4],
    /// Point light color premultiplied by intensity (rgb), decay exponent (w).
    pub point_color: [f32; 4],
}

impl From<&SceneLights> for LightUniforms {
    fn from(lights: &SceneLights) -> Self {
        let scaled = |color: Color, intensity: f32, w: f32| {
            [
                color.r * intensity,
                color.g * intensity,
                color.b * intensity,
                w,
            ]
        };
        Self {
            ambient: scaled(lights.ambient.color, lights.ambient.intensity, 0.0),
            moon_direction: lights.moon.to_light().extend(0.0).to_array(),
            moon_color: scaled(lights.moon.color, lights.moon.intensity, 0.0),
            point_position: lights.camera_light.position.extend(1.0).to_array(),
            point_color: scaled(
                lights.camera_light.color,
                lights.camera_light.intensity,
                lights.camera_light.decay,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moon_points_from_origin_toward_its_position() {
        let lights = SceneLights::default();
        let dir = lights.moon.to_light();
        let expected = Vec3::new(4.0, 5.0, -2.0).normalize();
        assert!((dir - expected).length() < 1e-6);
    }

    #[test]
    fn fog_factor_is_clear_before_near_and_opaque_after_far() {
        let fog = Fog::default();
        assert_eq!(fog.factor(0.5), 0.0);
        assert_eq!(fog.factor(20.0), 1.0);
        let mid = fog.factor(8.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn uniforms_premultiply_intensity() {
        let mut lights = SceneLights::default();
        lights.moon.intensity = 2.0;
        let uniforms = LightUniforms::from(&lights);
        let moon = Color::hex(0xb9d5ff);
        assert!((uniforms.moon_color[0] - moon.r * 2.0).abs() < 1e-6);
        assert_eq!(uniforms.point_color[3], 2.0);
    }
}
