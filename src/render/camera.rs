//! Render-camera state and screen-ray math

use glam::{Mat4, Vec3};

/// Ray in world (RAS) space
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Camera state of one renderer, synced from the active camera node
#[derive(Debug, Clone)]
pub struct RenderCamera {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub view_up: Vec3,
    /// Vertical view angle in degrees
    pub view_angle: f32,
    pub parallel: bool,
    /// Half-height of the viewport in world units when parallel
    pub parallel_scale: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 500.0, 0.0),
            focal_point: Vec3::ZERO,
            view_up: Vec3::new(0.0, 0.0, 1.0),
            view_angle: 30.0,
            parallel: false,
            parallel_scale: 100.0,
            near: 0.1,
            far: 10_000.0,
        }
    }
}

impl RenderCamera {
    /// Unit direction the camera looks along
    pub fn view_direction(&self) -> Vec3 {
        (self.focal_point - self.position).normalize_or_zero()
    }

    /// View-projection matrix for the given aspect ratio
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.position, self.focal_point, self.view_up);
        let proj = if self.parallel {
            let half_h = self.parallel_scale;
            let half_w = half_h * aspect;
            Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
        } else {
            Mat4::perspective_rh(
                self.view_angle.to_radians(),
                aspect,
                self.near,
                self.far,
            )
        };
        proj * view
    }

    /// Ray through a normalized screen position (0..1, y down)
    pub fn screen_ray(&self, screen_x: f32, screen_y: f32, aspect: f32) -> Ray {
        // Screen (0,1) to NDC (-1,1), flipping y.
        let ndc_x = screen_x * 2.0 - 1.0;
        let ndc_y = 1.0 - screen_y * 2.0;
        let inv = self.view_projection(aspect).inverse();
        let near_point = inv.project_point3(Vec3::new(ndc_x, ndc_y, -1.0));
        let far_point = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        Ray {
            origin: near_point,
            direction: (far_point - near_point).normalize_or_zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_at_focal_point() {
        let camera = RenderCamera {
            position: Vec3::new(0.0, 10.0, 0.0),
            focal_point: Vec3::ZERO,
            view_up: Vec3::Z,
            ..RenderCamera::default()
        };
        let ray = camera.screen_ray(0.5, 0.5, 1.0);
        assert!((ray.direction - camera.view_direction()).length() < 1e-4);
    }

    #[test]
    fn test_parallel_ray_direction_is_view_direction() {
        let camera = RenderCamera {
            position: Vec3::new(0.0, 10.0, 0.0),
            focal_point: Vec3::ZERO,
            view_up: Vec3::Z,
            parallel: true,
            parallel_scale: 5.0,
            ..RenderCamera::default()
        };
        let ray = camera.screen_ray(0.25, 0.75, 1.0);
        assert!((ray.direction - camera.view_direction()).length() < 1e-4);
        // Off-center parallel rays start off-axis.
        assert!(ray.origin.x.abs() > 1e-3 || ray.origin.z.abs() > 1e-3);
    }
}
