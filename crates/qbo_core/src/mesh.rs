//! Mesh geometry produced by the importers.
//!
//! A [`Mesh`] is a named list of [`Surface`]s. Each surface is an indexed
//! triangle list with one material, the unit committed by the OBJ grammar at
//! every `usemtl` / `o` / end-of-file boundary.

use std::sync::Arc;

use qbo_math::{Aabb, Vec2, Vec3, Vec4};

use crate::material::Material;

/// Number of bone influences stored per vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkinWeightCount {
    Four,
    Eight,
}

impl SkinWeightCount {
    pub fn count(self) -> usize {
        match self {
            SkinWeightCount::Four => 4,
            SkinWeightCount::Eight => 8,
        }
    }
}

/// Per-vertex bone influences, `influences.count()` entries per vertex.
///
/// Weights of each vertex are sorted by decreasing weight, zero-padded and
/// normalized to sum to one.
#[derive(Clone, Debug)]
pub struct SkinWeights {
    pub influences: SkinWeightCount,
    pub bones: Vec<u32>,
    pub weights: Vec<f32>,
}

impl SkinWeights {
    /// Bone indices and weights of one vertex.
    pub fn vertex(&self, index: usize) -> (&[u32], &[f32]) {
        let n = self.influences.count();
        let range = index * n..(index + 1) * n;
        (&self.bones[range.clone()], &self.weights[range])
    }
}

/// One committed, indexed triangle list with a single material.
#[derive(Clone, Debug)]
pub struct Surface {
    /// Surface name (material basename, group name or mesh name)
    pub name: String,

    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals, always present after commit
    pub normals: Vec<Vec3>,

    /// Tangents with handedness in `w`
    pub tangents: Option<Vec<Vec4>>,

    /// UV coordinates, V already flipped
    pub uvs: Option<Vec<Vec2>>,

    /// Vertex colors
    pub colors: Option<Vec<Vec4>>,

    /// Bone influences
    pub skin: Option<SkinWeights>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Material bound with `usemtl`, if it resolved
    pub material: Option<Arc<Material>>,

    /// Vertex attributes may be stored compressed
    pub compress: bool,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Surface {
    /// Get the number of triangles in the surface.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the surface.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the positions of one triangle.
    pub fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let tri = self.indices.get(index * 3..index * 3 + 3)?;
        Some([
            *self.positions.get(tri[0] as usize)?,
            *self.positions.get(tri[1] as usize)?,
            *self.positions.get(tri[2] as usize)?,
        ])
    }
}

/// A named collection of surfaces.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub surfaces: Vec<Surface>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surfaces: Vec::new(),
        }
    }

    /// Append a committed surface.
    pub fn add_surface(&mut self, surface: Surface) {
        self.surfaces.push(surface);
    }

    /// Get the number of surfaces.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Find a surface by name.
    pub fn surface(&self, name: &str) -> Option<&Surface> {
        self.surfaces.iter().find(|s| s.name == name)
    }

    /// Get the number of vertices across all surfaces.
    pub fn vertex_count(&self) -> usize {
        self.surfaces.iter().map(Surface::vertex_count).sum()
    }

    /// Get the number of triangles across all surfaces.
    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(Surface::triangle_count).sum()
    }

    /// Check if any surface carries bone influences.
    pub fn has_skin(&self) -> bool {
        self.surfaces.iter().any(|s| s.skin.is_some())
    }

    /// Bounding box of all surfaces.
    pub fn bounds(&self) -> Aabb {
        self.surfaces
            .iter()
            .fold(Aabb::EMPTY, |acc, s| Aabb::surrounding(&acc, &s.bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_surface(name: &str, offset: Vec3) -> Surface {
        let positions = vec![offset, offset + Vec3::X, offset + Vec3::Y];
        Surface {
            name: name.to_string(),
            bounds: Aabb::from_positions(&positions),
            normals: vec![Vec3::Z; 3],
            positions,
            tangents: None,
            uvs: None,
            colors: None,
            skin: None,
            indices: vec![0, 1, 2],
            material: None,
            compress: true,
        }
    }

    #[test]
    fn test_mesh_counts() {
        let mut mesh = Mesh::new("Mesh");
        mesh.add_surface(triangle_surface("a", Vec3::ZERO));
        mesh.add_surface(triangle_surface("b", Vec3::new(5.0, 0.0, 0.0)));

        assert_eq!(mesh.surface_count(), 2);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.has_skin());
        assert!(mesh.surface("b").is_some());
    }

    #[test]
    fn test_mesh_bounds() {
        let mut mesh = Mesh::new("Mesh");
        assert!(mesh.bounds().is_empty());

        mesh.add_surface(triangle_surface("a", Vec3::ZERO));
        mesh.add_surface(triangle_surface("b", Vec3::new(5.0, 0.0, 0.0)));

        let bounds = mesh.bounds();
        assert!((bounds.x.min - 0.0).abs() < 0.001);
        assert!((bounds.x.max - 6.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_lookup() {
        let surface = triangle_surface("a", Vec3::ZERO);
        assert_eq!(surface.triangle(0), Some([Vec3::ZERO, Vec3::X, Vec3::Y]));
        assert_eq!(surface.triangle(1), None);
    }

    #[test]
    fn test_skin_vertex_slice() {
        let skin = SkinWeights {
            influences: SkinWeightCount::Four,
            bones: vec![0, 1, 0, 0, 2, 0, 0, 0],
            weights: vec![0.75, 0.25, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        };
        let (bones, weights) = skin.vertex(1);
        assert_eq!(bones, &[2, 0, 0, 0]);
        assert_eq!(weights[0], 1.0);
    }
}
