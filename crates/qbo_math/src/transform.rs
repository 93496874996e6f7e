// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helper scene bounds need.

use crate::Aabb;
use glam::{Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return *aabb;
        }

        let min_point = aabb.min();
        let max_point = aabb.max();

        let corners = [
            Vec3::new(min_point.x, min_point.y, min_point.z),
            Vec3::new(max_point.x, min_point.y, min_point.z),
            Vec3::new(min_point.x, max_point.y, min_point.z),
            Vec3::new(max_point.x, max_point.y, min_point.z),
            Vec3::new(min_point.x, min_point.y, max_point.z),
            Vec3::new(max_point.x, min_point.y, max_point.z),
            Vec3::new(min_point.x, max_point.y, max_point.z),
            Vec3::new(max_point.x, max_point.y, max_point.z),
        ];

        corners
            .iter()
            .fold(Aabb::EMPTY, |acc, &corner| acc.include(self.transform_point3(corner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let aabb = Aabb::from_positions(&[Vec3::ZERO, Vec3::ONE]);
        let moved = mat.transform_aabb(&aabb);

        assert!((moved.x.min - 10.0).abs() < 0.001);
        assert!((moved.x.max - 11.0).abs() < 0.001);
        assert!((moved.y.max - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation() {
        let mat = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let aabb = Aabb::from_positions(&[Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)]);
        let rotated = mat.transform_aabb(&aabb);

        // X extent becomes Y extent
        assert!((rotated.y.size() - 2.0).abs() < 0.001);
        assert!((rotated.x.size() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_empty_aabb() {
        let mat = Mat4::from_translation(Vec3::ONE);
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }
}
