use glam::{Vec2, Vec3};
use winit::event::MouseButton;

use crate::camera::PerspectiveCamera;
use crate::input::Input;

const EPS: f32 = 1e-6;

/// Spherical coordinates of a camera offset around its target.
///
/// `phi` is the polar angle from +Y, `theta` the azimuth around Y measured
/// from +Z toward +X.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }

    /// Keep `phi` off the poles, where the azimuth is undefined.
    pub fn make_safe(&mut self) {
        self.phi = self.phi.clamp(EPS, std::f32::consts::PI - EPS);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Drag {
    #[default]
    None,
    Rotate,
    Pan,
}

/// Mouse-driven orbit controls with inertia.
///
/// Left drag rotates around `target`, right drag pans, the wheel dollies.
/// Input only queues motion; [`update`](Self::update) applies a damped
/// fraction of it to the camera once per frame.
///
/// ```ignore
/// controls.handle_input(&input, &camera, window_height);
/// controls.update(&mut camera);
/// ```
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    /// Fraction of the pending motion applied per update.
    pub damping_factor: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
    drag: Drag,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            spherical_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            drag: Drag::None,
        }
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Enable inertia with the given damping factor.
    pub fn damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor;
        self
    }

    /// Limit the polar angle, in radians from +Y.
    pub fn polar_limits(mut self, min: f32, max: f32) -> Self {
        self.min_polar_angle = min;
        self.max_polar_angle = max;
        self
    }

    pub fn is_dragging(&self) -> bool {
        self.drag != Drag::None
    }

    /// Queue a rotation around the vertical axis.
    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    /// Queue a change of the polar angle.
    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    /// Scale the orbit radius on the next update; below 1 moves closer.
    pub fn dolly(&mut self, factor: f32) {
        self.scale *= factor;
    }

    /// Queue a target translation in world space.
    pub fn pan(&mut self, offset: Vec3) {
        self.pan_offset += offset;
    }

    /// Translate queued screen-space drag (in pixels) into a pan that keeps the
    /// point under the cursor at the target's depth.
    pub fn pan_screen(&mut self, delta: Vec2, camera: &PerspectiveCamera, viewport_height: f32) {
        let distance = (camera.position - self.target).length()
            * (camera.fov.to_radians() * 0.5).tan();
        let left = 2.0 * delta.x * distance / viewport_height;
        let up = 2.0 * delta.y * distance / viewport_height;
        self.pan(-camera.right() * left + camera.screen_up() * up);
    }

    /// Queue motion from this frame's pointer input.
    ///
    /// `viewport_height` must be in the same pixel unit as the input deltas.
    pub fn handle_input(&mut self, input: &Input, camera: &PerspectiveCamera, viewport_height: f32) {
        if input.mouse_pressed(MouseButton::Left) {
            self.drag = Drag::Rotate;
        } else if input.mouse_pressed(MouseButton::Right) {
            self.drag = Drag::Pan;
        }

        let height = viewport_height.max(1.0);
        match self.drag {
            Drag::Rotate if input.mouse_down(MouseButton::Left) => {
                let delta = input.cursor_delta() * self.rotate_speed;
                self.rotate_left(std::f32::consts::TAU * delta.x / height);
                self.rotate_up(std::f32::consts::TAU * delta.y / height);
            }
            Drag::Pan if input.mouse_down(MouseButton::Right) => {
                let delta = input.cursor_delta() * self.pan_speed;
                self.pan_screen(delta, camera, height);
            }
            _ => self.drag = Drag::None,
        }

        let lines = input.scroll_lines();
        if lines != 0.0 {
            self.dolly(0.95f32.powf(self.zoom_speed * lines));
        }
    }

    /// Apply pending motion to the camera and decay it.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        let mut spherical = Spherical::from_offset(camera.position - self.target);

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.spherical_delta.theta * step;
        spherical.phi += self.spherical_delta.phi * step;
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle);
        spherical.make_safe();
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * step;

        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= decay;
            self.spherical_delta.phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn camera_at(position: Vec3) -> PerspectiveCamera {
        PerspectiveCamera::new(75.0, 16.0 / 9.0, 0.1, 100.0).at(position)
    }

    fn polar(camera: &PerspectiveCamera, target: Vec3) -> f32 {
        Spherical::from_offset(camera.position - target).phi
    }

    #[test]
    fn spherical_round_trips_an_offset() {
        let offset = Vec3::new(-2.0, 1.0, -5.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-5);
    }

    #[test]
    fn polar_angle_is_clamped_on_update() {
        let target = Vec3::new(0.0, 1.0, 0.0);
        let mut controls = OrbitControls::new()
            .target(target)
            .damping(0.05)
            .polar_limits(PI / 4.0, PI / 2.5);
        let mut camera = camera_at(Vec3::new(-2.0, 2.0, -5.0));

        controls.update(&mut camera);
        let phi = polar(&camera, target);
        assert!(phi >= PI / 4.0 - 1e-5 && phi <= PI / 2.5 + 1e-5);

        controls.rotate_up(10.0);
        for _ in 0..200 {
            controls.update(&mut camera);
            let phi = polar(&camera, target);
            assert!(phi >= PI / 4.0 - 1e-4 && phi <= PI / 2.5 + 1e-4, "phi = {phi}");
        }
    }

    #[test]
    fn damped_rotation_converges() {
        let mut controls = OrbitControls::new().damping(0.05);
        let mut camera = camera_at(Vec3::new(0.0, 0.0, 5.0));
        controls.rotate_left(1.0);

        let mut previous = camera.position;
        let mut last_step = f32::MAX;
        for _ in 0..400 {
            controls.update(&mut camera);
            last_step = (camera.position - previous).length();
            previous = camera.position;
        }
        assert!(last_step < 1e-4);
        // Total rotation approaches the queued angle
        let theta = Spherical::from_offset(camera.position).theta;
        assert!((theta + 1.0).abs() < 1e-3, "theta = {theta}");
        assert!((camera.position.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn dolly_changes_radius_once() {
        let mut controls = OrbitControls::new().damping(0.05);
        let mut camera = camera_at(Vec3::new(0.0, 0.0, 4.0));
        controls.dolly(0.5);
        controls.update(&mut camera);
        assert!((camera.position.length() - 2.0).abs() < 1e-5);
        controls.update(&mut camera);
        assert!((camera.position.length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn camera_looks_at_target_after_update() {
        let target = Vec3::new(0.0, 1.0, 0.0);
        let mut controls = OrbitControls::new().target(target);
        let mut camera = camera_at(Vec3::new(3.0, 2.0, 3.0));
        controls.pan(Vec3::X);
        controls.update(&mut camera);
        assert_eq!(controls.target, Vec3::new(1.0, 1.0, 0.0));
        let expected = (controls.target - camera.position).normalize();
        assert!((camera.forward - expected).length() < 1e-5);
    }

    #[test]
    fn wheel_up_moves_closer() {
        let mut controls = OrbitControls::new();
        let mut camera = camera_at(Vec3::new(0.0, 0.0, 10.0));
        let mut input = Input::new();
        input.scroll(1.0);
        controls.handle_input(&input, &camera, 720.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 9.5).abs() < 1e-4);
    }

    #[test]
    fn left_drag_rotates() {
        let mut controls = OrbitControls::new();
        let mut camera = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut input = Input::new();
        input.move_cursor(Vec2::new(100.0, 100.0));
        input.press(MouseButton::Left);
        input.move_cursor(Vec2::new(190.0, 100.0));
        controls.handle_input(&input, &camera, 720.0);
        assert!(controls.is_dragging());
        controls.update(&mut camera);
        let theta = Spherical::from_offset(camera.position).theta;
        assert!((theta + std::f32::consts::TAU * 90.0 / 720.0).abs() < 1e-4);

        input.end_frame();
        input.release(MouseButton::Left);
        controls.handle_input(&input, &camera, 720.0);
        assert!(!controls.is_dragging());
    }
}
