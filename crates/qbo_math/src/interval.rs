/// A closed range of floats along one axis.
///
/// Bounding boxes are built from three of these. An interval whose `min` is
/// greater than its `max` is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Returns true if the interval contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Grow the interval so it contains `x`.
    pub fn include(&self, x: f32) -> Interval {
        Interval::new(self.min.min(x), self.max.max(x))
    }

    /// Creates an interval that surrounds two other intervals.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }

    /// Returns true if both ends lie within `epsilon` of zero.
    ///
    /// Used to detect geometry that is flat along an axis.
    pub fn is_near_zero(&self, epsilon: f32) -> bool {
        !self.is_empty() && self.min.abs() < epsilon && self.max.abs() < epsilon
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_size() {
        let interval = Interval::new(2.0, 7.0);
        assert_eq!(interval.size(), 5.0);

        let negative = Interval::new(-5.0, 5.0);
        assert_eq!(negative.size(), 10.0);
    }

    #[test]
    fn test_interval_include() {
        let interval = Interval::EMPTY.include(3.0).include(-1.0);
        assert_eq!(interval.min, -1.0);
        assert_eq!(interval.max, 3.0);
        assert_eq!(interval.size(), 4.0);
    }

    #[test]
    fn test_interval_empty() {
        let empty = Interval::EMPTY;

        assert!(empty.is_empty());
        assert!(!empty.include(2.0).is_empty());
        assert!(!empty.is_near_zero(1.0));
    }

    #[test]
    fn test_interval_near_zero() {
        assert!(Interval::new(-0.000001, 0.000001).is_near_zero(0.00001));
        assert!(!Interval::new(0.0, 0.5).is_near_zero(0.00001));
    }

    #[test]
    fn test_interval_surrounding() {
        let a = Interval::new(1.0, 5.0);
        let b = Interval::new(-2.0, 3.0);
        let result = Interval::surrounding(&a, &b);

        assert_eq!(result.min, -2.0);
        assert_eq!(result.max, 5.0);
    }
}
