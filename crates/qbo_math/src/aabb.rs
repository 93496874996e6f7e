use crate::{Interval, Vec3};

/// Axis-Aligned Bounding Box of imported geometry.
///
/// An AABB is defined by three intervals (one per axis). Unlike a ray tracing
/// box it is never padded, so a planar mesh keeps a zero-width axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// Create the tightest AABB around a set of positions.
    ///
    /// Returns an empty box when `positions` is empty.
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Vec3>) -> Self {
        positions
            .into_iter()
            .fold(Self::EMPTY, |aabb, p| aabb.include(*p))
    }

    /// Grow the box so it contains `point`.
    pub fn include(&self, point: Vec3) -> Aabb {
        Aabb {
            x: self.x.include(point.x),
            y: self.y.include(point.y),
            z: self.z.include(point.z),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Returns true if no point has been added to the box.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Size of the box along each axis.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.x.size(), self.y.size(), self.z.size())
    }

    /// Static constants
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_positions_keeps_flat_axis() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let aabb = Aabb::from_positions(&positions);

        assert_eq!(aabb.z.size(), 0.0);
        assert_eq!(aabb.extent(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(aabb.min(), Vec3::ZERO);
    }

    #[test]
    fn test_aabb_empty() {
        let aabb = Aabb::from_positions(&[]);
        assert!(aabb.is_empty());
        assert!(Aabb::default().is_empty());
        assert!(!Aabb::EMPTY.include(Vec3::ONE).is_empty());
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_positions(&[Vec3::ZERO, Vec3::splat(5.0)]);
        let box2 = Aabb::from_positions(&[Vec3::splat(3.0), Vec3::splat(10.0)]);
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.min(), Vec3::ZERO);
        assert_eq!(surrounding.max(), Vec3::splat(10.0));
        // Surrounding an empty box changes nothing
        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &box1), box1);
    }
}
