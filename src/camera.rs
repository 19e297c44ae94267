//! Slow orbiting camera around the scene origin.

use glam::{Mat4, Vec3};

use crate::params::{CameraOrbit, RenderConfig};

/// Camera system with a continuous circular orbit
pub struct CameraSystem {
    orbit: CameraOrbit,
}

impl CameraSystem {
    pub fn new(orbit: CameraOrbit) -> Self {
        Self { orbit }
    }

    /// Compute camera position and look-at target for given time
    pub fn compute_position_and_target(&self, time_s: f32) -> (Vec3, Vec3) {
        let angle = time_s * self.orbit.rate;
        let eye = Vec3::new(
            angle.sin() * self.orbit.radius,
            self.orbit.height,
            angle.cos() * self.orbit.radius,
        );
        (eye, Vec3::ZERO)
    }

    /// Create view-projection matrix for rendering
    ///
    /// # Returns
    /// Tuple of (view_proj_matrix, camera_position)
    pub fn create_view_proj_matrix(
        &self,
        time_s: f32,
        render_config: &RenderConfig,
    ) -> (Mat4, Vec3) {
        let (eye, target) = self.compute_position_and_target(time_s);

        // Always keep Y as up vector (camera never rolls)
        let up = Vec3::Y;

        let view = Mat4::look_at_rh(eye, target, up);
        let proj = Mat4::perspective_rh(
            render_config.fov_degrees.to_radians(),
            render_config.aspect_ratio(),
            render_config.near_plane,
            render_config.far_plane,
        );

        (proj * view, eye)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_stays_on_circle() {
        let orbit = CameraOrbit::default();
        let camera = CameraSystem::new(orbit.clone());

        for t in 0..100 {
            let (eye, target) = camera.compute_position_and_target(t as f32 * 0.5);
            let horizontal = (eye.x * eye.x + eye.z * eye.z).sqrt();
            assert!((horizontal - orbit.radius).abs() < 1e-3);
            assert_eq!(eye.y, orbit.height);
            assert_eq!(target, Vec3::ZERO);
        }
    }

    #[test]
    fn test_view_proj_matrix_generation() {
        let camera = CameraSystem::new(CameraOrbit::default());
        let render_config = RenderConfig::default();

        let (view_proj, eye_pos) = camera.create_view_proj_matrix(0.0, &render_config);

        // Matrix should not be identity or zero
        assert_ne!(view_proj, Mat4::IDENTITY);
        assert_ne!(view_proj, Mat4::ZERO);

        assert!(eye_pos.x.is_finite());
        assert!(eye_pos.y.is_finite());
        assert!(eye_pos.z.is_finite());
    }
}
