//! Source vertex buffers and face resolution.
//!
//! `v`/`vt`/`vn`/`vw` lines fill [`SourceBuffers`]. Each `f` line is resolved
//! against them into [`FaceRef`]s and fanned into triangles on a
//! [`SurfaceBuilder`].

use std::collections::HashMap;

use qbo_math::{Aabb, Vec2, Vec3, Vec4, CMP_EPSILON};
use thiserror::Error;

use crate::surface_tool::{SurfaceBuilder, Vertex};
use crate::tokens;

/// Reasons a face line is rejected.
#[derive(Error, Debug, PartialEq)]
pub enum FaceError {
    #[error("face needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("face vertex '{token}' has {found} index parts, expected {expected}")]
    MixedFormat {
        token: String,
        found: usize,
        expected: usize,
    },

    #[error("{kind} index {index} out of range (have {count})")]
    IndexOutOfRange {
        kind: &'static str,
        index: i64,
        count: usize,
    },
}

/// Resolved 0-based indices of one face corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceRef {
    pub position: usize,
    pub uv: Option<usize>,
    pub normal: Option<usize>,
}

/// Per-face emission settings from the grammar state.
#[derive(Clone, Copy, Debug)]
pub struct FaceContext {
    pub smooth_group: u32,
    /// Give every vertex a fixed tangent because the file has no UVs.
    pub dummy_tangents: bool,
}

/// Vertex data declared so far in the file.
#[derive(Debug, Default)]
pub struct SourceBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Empty until the first colored `v`, then parallel to `positions`
    pub colors: Vec<Vec4>,
    /// Bone influences keyed by source vertex index
    pub weights: HashMap<usize, Vec<(u32, f32)>>,
}

impl SourceBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a position. The first color back-fills earlier vertices with
    /// white, and once colors exist uncolored vertices get white.
    pub fn push_position(&mut self, position: Vec3, color: Option<Vec4>) {
        match color {
            Some(color) => {
                self.colors.resize(self.positions.len(), Vec4::ONE);
                self.colors.push(color);
            }
            None if !self.colors.is_empty() => self.colors.push(Vec4::ONE),
            None => {}
        }
        self.positions.push(position);
    }

    /// Record the weight of `bone` on a source vertex, replacing an earlier
    /// weight for the same bone.
    pub fn set_weight(&mut self, vertex: usize, bone: u32, weight: f32) {
        let influences = self.weights.entry(vertex).or_default();
        match influences.iter_mut().find(|(b, _)| *b == bone) {
            Some(entry) => entry.1 = weight,
            None => influences.push((bone, weight)),
        }
    }

    pub fn has_weights(&self) -> bool {
        !self.weights.is_empty()
    }

    /// True if every position lies on the z = 0 plane.
    pub fn is_flat(&self) -> bool {
        Aabb::from_positions(&self.positions)
            .z
            .is_near_zero(CMP_EPSILON)
    }

    /// Resolve the corner tokens of a face line (keyword excluded).
    ///
    /// Every corner must use the same number of `/` parts as the first one.
    pub fn parse_face(&self, corners: &[&str]) -> Result<Vec<FaceRef>, FaceError> {
        if corners.len() < 3 {
            return Err(FaceError::TooFewVertices(corners.len()));
        }
        let expected = corners[0].split('/').count();

        corners
            .iter()
            .map(|token| {
                let parts: Vec<&str> = token.split('/').collect();
                if parts.len() != expected {
                    return Err(FaceError::MixedFormat {
                        token: token.to_string(),
                        found: parts.len(),
                        expected,
                    });
                }

                let position = resolve_part("vertex", parts[0], self.positions.len())?;
                let uv = match parts.get(1) {
                    Some(part) if !part.is_empty() => {
                        Some(resolve_part("uv", part, self.uvs.len())?)
                    }
                    _ => None,
                };
                let normal = match parts.get(2) {
                    Some(part) if !part.is_empty() => {
                        Some(resolve_part("normal", part, self.normals.len())?)
                    }
                    _ => None,
                };

                Ok(FaceRef {
                    position,
                    uv,
                    normal,
                })
            })
            .collect()
    }

    /// Fan-triangulate a resolved face onto `builder`.
    ///
    /// Emits (v0, v[i-1], v[i]) for i >= 2, preserving file order so a
    /// counter-clockwise polygon yields counter-clockwise triangles.
    pub fn emit_face(&self, corners: &[FaceRef], context: FaceContext, builder: &mut SurfaceBuilder) {
        for i in 2..corners.len() {
            for corner in [corners[0], corners[i - 1], corners[i]] {
                builder.add_vertex(self.vertex(corner, context));
            }
        }
    }

    fn vertex(&self, corner: FaceRef, context: FaceContext) -> Vertex {
        let normal = corner.normal.map(|i| self.normals[i]);
        Vertex {
            position: self.positions[corner.position],
            normal,
            tangent: context.dummy_tangents.then(|| dummy_tangent(normal)),
            uv: corner.uv.map(|i| self.uvs[i]),
            color: self.colors.get(corner.position).copied(),
            bones: self
                .weights
                .get(&corner.position)
                .cloned()
                .unwrap_or_default(),
            smooth_group: context.smooth_group,
        }
    }
}

/// Turn a 1-based (or negative, end-relative) OBJ index into a 0-based one.
pub fn resolve_index(raw: i64, count: usize) -> Option<usize> {
    let one_based = if raw < 0 { count as i64 + raw + 1 } else { raw };
    if one_based < 1 || one_based > count as i64 {
        None
    } else {
        Some((one_based - 1) as usize)
    }
}

fn resolve_part(kind: &'static str, token: &str, count: usize) -> Result<usize, FaceError> {
    let index = tokens::to_int(token);
    resolve_index(index, count).ok_or(FaceError::IndexOutOfRange { kind, index, count })
}

/// Tangent for files without UVs, derived only from the normal.
fn dummy_tangent(normal: Option<Vec3>) -> Vec4 {
    match normal {
        Some(n) => Vec3::new(n.z, -n.x, n.y)
            .cross(n.normalize_or_zero())
            .normalize_or_zero()
            .extend(1.0),
        None => Vec4::new(1.0, 0.0, 0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_buffers() -> SourceBuffers {
        let mut buffers = SourceBuffers::new();
        buffers.push_position(Vec3::new(0.0, 0.0, 0.0), None);
        buffers.push_position(Vec3::new(1.0, 0.0, 0.0), None);
        buffers.push_position(Vec3::new(0.0, 1.0, 0.0), None);
        buffers
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(1, 3), Some(0));
        assert_eq!(resolve_index(3, 3), Some(2));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
        assert_eq!(resolve_index(0, 3), None);
        assert_eq!(resolve_index(4, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }

    #[test]
    fn test_negative_indices_match_positive() {
        let buffers = triangle_buffers();
        let negative = buffers.parse_face(&["-1", "-2", "-3"]).unwrap();
        let positive = buffers.parse_face(&["3", "2", "1"]).unwrap();
        assert_eq!(negative, positive);
    }

    #[test]
    fn test_face_parts() {
        let mut buffers = triangle_buffers();
        buffers.uvs.push(Vec2::ZERO);
        buffers.normals.push(Vec3::Z);

        let refs = buffers.parse_face(&["1/1/1", "2/1/1", "3/1/1"]).unwrap();
        assert_eq!(refs[1], FaceRef { position: 1, uv: Some(0), normal: Some(0) });

        let refs = buffers.parse_face(&["1//1", "2//1", "3//1"]).unwrap();
        assert_eq!(refs[0].uv, None);
        assert_eq!(refs[0].normal, Some(0));
    }

    #[test]
    fn test_face_errors() {
        let buffers = triangle_buffers();
        assert_eq!(
            buffers.parse_face(&["1", "2"]),
            Err(FaceError::TooFewVertices(2))
        );
        assert!(matches!(
            buffers.parse_face(&["1", "2/1", "3"]),
            Err(FaceError::MixedFormat { found: 2, expected: 1, .. })
        ));
        assert!(matches!(
            buffers.parse_face(&["1", "2", "4"]),
            Err(FaceError::IndexOutOfRange { kind: "vertex", index: 4, .. })
        ));
        assert!(matches!(
            buffers.parse_face(&["1/1", "2/1", "3/1"]),
            Err(FaceError::IndexOutOfRange { kind: "uv", .. })
        ));
    }

    #[test]
    fn test_color_back_fill() {
        let mut buffers = SourceBuffers::new();
        buffers.push_position(Vec3::ZERO, None);
        assert!(buffers.colors.is_empty());

        buffers.push_position(Vec3::X, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        buffers.push_position(Vec3::Y, None);

        assert_eq!(
            buffers.colors,
            vec![Vec4::ONE, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::ONE]
        );
    }

    #[test]
    fn test_fan_triangulation() {
        let mut buffers = triangle_buffers();
        buffers.push_position(Vec3::new(1.0, 1.0, 0.0), None);
        let quad = buffers.parse_face(&["1", "2", "4", "3"]).unwrap();

        let mut builder = SurfaceBuilder::new();
        let context = FaceContext {
            smooth_group: 0,
            dummy_tangents: false,
        };
        buffers.emit_face(&quad, context, &mut builder);
        assert_eq!(builder.vertex_count(), 6);

        builder.generate_normals();
        let surface = builder.commit("quad", None, true);
        assert_eq!(surface.triangle_count(), 2);
        assert!(surface.normals.iter().all(|n| (n.z - 1.0).abs() < 0.001));
    }

    #[test]
    fn test_dummy_tangent_is_perpendicular() {
        let n = Vec3::new(0.0, 1.0, 0.0);
        let t = dummy_tangent(Some(n));
        assert!(t.truncate().dot(n).abs() < 0.0001);
        assert!((t.truncate().length() - 1.0).abs() < 0.001);
        assert_eq!(dummy_tangent(None), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_weights_replace_same_bone() {
        let mut buffers = triangle_buffers();
        buffers.set_weight(0, 2, 0.5);
        buffers.set_weight(0, 2, 0.8);
        buffers.set_weight(0, 1, 0.2);
        assert_eq!(buffers.weights[&0], vec![(2, 0.8), (1, 0.2)]);
    }

    #[test]
    fn test_flat_detection() {
        let mut buffers = triangle_buffers();
        assert!(buffers.is_flat());
        buffers.push_position(Vec3::new(0.0, 0.0, 0.5), None);
        assert!(!buffers.is_flat());
    }
}
