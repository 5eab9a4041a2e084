use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::world::ViewportProjector;
use crate::{require_positive, ConfigurationError};

/// Top-down orthographic view looking straight down the Y axis. World X maps
/// to viewport X and world Z maps to viewport Y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrthographicCamera {
    #[serde(skip)]
    pub position: Vec3,
    /// Half of the visible height in world units.
    pub orthographic_size: f32,
    pub aspect: f32,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orthographic_size: 10.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl OrthographicCamera {
    pub fn new(orthographic_size: f32, aspect: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orthographic_size,
            aspect,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("camera.orthographic_size", self.orthographic_size)?;
        require_positive("camera.aspect", self.aspect)
    }

    pub fn follow(&mut self, target: Vec3) {
        self.position = target;
    }
}

impl ViewportProjector for OrthographicCamera {
    fn world_to_viewport(&self, point: Vec3) -> Vec2 {
        let half = self.view_half_extents();
        let offset = point - self.position;
        Vec2::new(
            offset.x / (half.x * 2.0) + 0.5,
            offset.z / (half.y * 2.0) + 0.5,
        )
    }

    fn view_half_extents(&self) -> Vec2 {
        Vec2::new(self.orthographic_size * self.aspect, self.orthographic_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_position_maps_to_viewport_center() {
        let mut camera = OrthographicCamera::new(10.0, 2.0);
        camera.follow(Vec3::new(4.0, 0.0, -3.0));
        assert_eq!(
            camera.world_to_viewport(Vec3::new(4.0, 7.0, -3.0)),
            Vec2::new(0.5, 0.5)
        );
    }

    #[test]
    fn edges_of_view_map_to_unit_bounds() {
        let camera = OrthographicCamera::new(10.0, 2.0);
        assert_eq!(camera.view_half_extents(), Vec2::new(20.0, 10.0));
        assert_eq!(
            camera.world_to_viewport(Vec3::new(20.0, 0.0, -10.0)),
            Vec2::new(1.0, 0.0)
        );
        assert!(camera.is_on_screen(Vec3::new(19.0, 0.0, 9.0)));
        assert!(!camera.is_on_screen(Vec3::new(21.0, 0.0, 0.0)));
    }
}
