// Re-export glam for convenience
pub use glam::*;

// Importer math types
mod aabb;
mod approx;
mod interval;
mod transform;

pub use aabb::Aabb;
pub use approx::{is_zero_approx, CMP_EPSILON};
pub use interval::Interval;
pub use transform::Mat4Ext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_quat_axis_composition() {
        // Rotating 90 degrees around Z then mapping X should land on Y
        let q = Quat::IDENTITY * Quat::from_axis_angle(Vec3::Z, 90f32.to_radians());
        let v = q * Vec3::X;
        assert!((v - Vec3::Y).length() < 0.001);
    }
}
