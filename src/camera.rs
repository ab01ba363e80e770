use glam::{Mat4, Vec3};

/// A perspective camera.
///
/// The projection matrix is cached: after changing `fov`, `aspect`, `near` or
/// `far`, call [`update_projection_matrix`](Self::update_projection_matrix).
#[derive(Clone, Copy, Debug)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov,
            aspect,
            near,
            far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Point the camera at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        self.forward = (target - self.position).normalize_or(self.forward);
    }

    /// Recompute the cached projection from the current parameters.
    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// Camera-space +X in world space.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    /// Camera-space +Y in world space, orthogonal to `forward`.
    pub fn screen_up(&self) -> Vec3 {
        self.right().cross(self.forward).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_cached_until_updated() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        let before = camera.projection_matrix();
        camera.aspect = 2.0;
        assert_eq!(camera.projection_matrix(), before);
        camera.update_projection_matrix();
        assert_ne!(camera.projection_matrix(), before);
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0).at(Vec3::new(0.0, 0.0, 5.0));
        camera.look_at(Vec3::ZERO);
        assert!((camera.forward - Vec3::NEG_Z).length() < 1e-6);
        let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
    }

    #[test]
    fn basis_is_orthonormal() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0).at(Vec3::new(-2.0, 2.0, -5.0));
        camera.look_at(Vec3::new(0.0, 1.0, 0.0));
        assert!(camera.right().dot(camera.forward).abs() < 1e-5);
        assert!(camera.screen_up().dot(camera.forward).abs() < 1e-5);
        assert!((camera.screen_up().length() - 1.0).abs() < 1e-5);
    }
}
