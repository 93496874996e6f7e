/// Tolerance used when comparing floats parsed from asset files.
pub const CMP_EPSILON: f32 = 0.00001;

/// Returns true if `value` is within [`CMP_EPSILON`] of zero.
#[inline]
pub fn is_zero_approx(value: f32) -> bool {
    value.abs() < CMP_EPSILON
}
