//! Working buffer that turns emitted face vertices into a committed [`Surface`].
//!
//! Vertices are appended as an unindexed triangle list (every three vertices
//! form one triangle). Before commit the builder can synthesize missing
//! normals, derive tangents from UVs and merge identical vertices.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use qbo_math::{Aabb, Vec2, Vec3, Vec4};

use crate::material::Material;
use crate::mesh::{SkinWeightCount, SkinWeights, Surface};

/// Smoothing group tag for vertices emitted while smoothing is off.
pub const NO_SMOOTHING: u32 = u32::MAX;

/// Largest |tangent . normal| that still allows attribute compression.
pub const TANGENT_PERPENDICULAR_TOLERANCE: f32 = 1e-4;

const DEFAULT_TANGENT: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

/// One fully resolved face vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub tangent: Option<Vec4>,
    pub uv: Option<Vec2>,
    pub color: Option<Vec4>,
    /// `(bone index, weight)` pairs, unsorted
    pub bones: Vec<(u32, f32)>,
    pub smooth_group: u32,
}

impl Vertex {
    /// A vertex with only a position, in smoothing group 0.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            normal: None,
            tangent: None,
            uv: None,
            color: None,
            bones: Vec::new(),
            smooth_group: 0,
        }
    }
}

/// Accumulates the vertices of one surface until it is committed.
#[derive(Debug, Default)]
pub struct SurfaceBuilder {
    vertices: Vec<Vertex>,
    indices: Option<Vec<u32>>,
    eight_weights: bool,
}

impl SurfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex. Three consecutive vertices form a triangle.
    ///
    /// A vertex with more than four bone weights switches the whole surface
    /// to eight influences per vertex.
    pub fn add_vertex(&mut self, vertex: Vertex) {
        if vertex.bones.len() > 4 {
            self.eight_weights = true;
        }
        self.vertices.push(vertex);
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True if at least one vertex has no normal yet.
    pub fn needs_normals(&self) -> bool {
        self.vertices.iter().any(|v| v.normal.is_none())
    }

    pub fn has_colors(&self) -> bool {
        self.vertices.iter().any(|v| v.color.is_some())
    }

    /// Fill in missing normals from the triangle topology.
    ///
    /// Vertices sharing a position and smoothing group get the average of the
    /// adjacent face normals. Vertices tagged [`NO_SMOOTHING`] take the normal
    /// of their own face. Normals already present are kept.
    pub fn generate_normals(&mut self) {
        let triangles = self.triangle_indices();
        let mut face_normals = Vec::with_capacity(triangles.len());
        let mut smoothed: HashMap<[u32; 4], Vec3> = HashMap::new();

        for tri in &triangles {
            let [a, b, c] = tri.map(|i| self.vertices[i].position);
            let normal = (b - a).cross(c - a).normalize_or_zero();
            face_normals.push(normal);

            for &i in tri {
                let vertex = &self.vertices[i];
                if vertex.smooth_group != NO_SMOOTHING {
                    *smoothed.entry(smooth_key(vertex)).or_insert(Vec3::ZERO) += normal;
                }
            }
        }

        for (tri, face_normal) in triangles.iter().zip(&face_normals) {
            for &i in tri {
                let key = smooth_key(&self.vertices[i]);
                let vertex = &mut self.vertices[i];
                if vertex.normal.is_some() {
                    continue;
                }
                let normal = if vertex.smooth_group == NO_SMOOTHING {
                    *face_normal
                } else {
                    smoothed
                        .get(&key)
                        .copied()
                        .unwrap_or(*face_normal)
                        .normalize_or_zero()
                };
                // Degenerate faces still need a unit normal
                vertex.normal = Some(if normal == Vec3::ZERO { Vec3::Y } else { normal });
            }
        }
    }

    /// Derive tangents from UV-space derivatives.
    ///
    /// Contributions are accumulated per identical (position, normal, uv)
    /// vertex, orthogonalized against the normal, and the bitangent sign is
    /// stored in `w`. Overwrites any tangent already present.
    pub fn generate_tangents(&mut self) {
        let triangles = self.triangle_indices();
        let mut accumulated: HashMap<[u32; 8], (Vec3, Vec3)> = HashMap::new();

        for tri in &triangles {
            let [v0, v1, v2] = tri.map(|i| &self.vertices[i]);
            let [uv0, uv1, uv2] = [v0, v1, v2].map(|v| v.uv.unwrap_or(Vec2::ZERO));

            let edge1 = v1.position - v0.position;
            let edge2 = v2.position - v0.position;
            let duv1 = uv1 - uv0;
            let duv2 = uv2 - uv0;

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < 1e-12 {
                continue;
            }
            let r = 1.0 / det;
            let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
            let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

            for vertex in [v0, v1, v2] {
                let entry = accumulated
                    .entry(tangent_key(vertex))
                    .or_insert((Vec3::ZERO, Vec3::ZERO));
                entry.0 += tangent;
                entry.1 += bitangent;
            }
        }

        for vertex in &mut self.vertices {
            let (tangent, bitangent) = accumulated
                .get(&tangent_key(vertex))
                .copied()
                .unwrap_or((Vec3::ZERO, Vec3::ZERO));
            let normal = vertex.normal.unwrap_or(Vec3::Z).normalize_or_zero();

            let mut t = (tangent - normal * normal.dot(tangent)).normalize_or_zero();
            if t == Vec3::ZERO {
                t = if normal == Vec3::ZERO {
                    Vec3::X
                } else {
                    normal.any_orthonormal_vector()
                };
            }
            let handedness = if normal.cross(t).dot(bitangent) < 0.0 { -1.0 } else { 1.0 };
            vertex.tangent = Some(t.extend(handedness));
        }
    }

    /// Merge bit-identical vertices and build the index list.
    pub fn index(&mut self) {
        if self.indices.is_some() {
            return;
        }

        let mut lookup: HashMap<Vec<u32>, u32> = HashMap::new();
        let mut unique = Vec::new();
        let mut indices = Vec::with_capacity(self.vertices.len());

        for vertex in self.vertices.drain(..) {
            let index = match lookup.entry(vertex_key(&vertex)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let index = unique.len() as u32;
                    unique.push(vertex);
                    *entry.insert(index)
                }
            };
            indices.push(index);
        }

        self.vertices = unique;
        self.indices = Some(indices);
    }

    /// Finish the surface and reset the builder.
    ///
    /// `compress` is cleared when any tangent is not perpendicular to its
    /// normal.
    pub fn commit(
        &mut self,
        name: impl Into<String>,
        material: Option<Arc<Material>>,
        compress: bool,
    ) -> Surface {
        self.index();

        let vertices = std::mem::take(&mut self.vertices);
        let indices = self.indices.take().unwrap_or_default();
        let influences = if self.eight_weights {
            SkinWeightCount::Eight
        } else {
            SkinWeightCount::Four
        };
        self.clear();

        let positions: Vec<Vec3> = vertices.iter().map(|v| v.position).collect();
        let normals: Vec<Vec3> = vertices
            .iter()
            .map(|v| v.normal.unwrap_or(Vec3::Y))
            .collect();
        let tangents = vertices.iter().any(|v| v.tangent.is_some()).then(|| {
            vertices
                .iter()
                .map(|v| v.tangent.unwrap_or(DEFAULT_TANGENT))
                .collect::<Vec<_>>()
        });
        let uvs = vertices.iter().any(|v| v.uv.is_some()).then(|| {
            vertices
                .iter()
                .map(|v| v.uv.unwrap_or(Vec2::ZERO))
                .collect::<Vec<_>>()
        });
        let colors = vertices.iter().any(|v| v.color.is_some()).then(|| {
            vertices
                .iter()
                .map(|v| v.color.unwrap_or(Vec4::ONE))
                .collect::<Vec<_>>()
        });
        let skin = vertices
            .iter()
            .any(|v| !v.bones.is_empty())
            .then(|| build_skin(&vertices, influences));

        let tangents_perpendicular = tangents.as_ref().map_or(true, |tangents| {
            tangents
                .iter()
                .zip(&normals)
                .all(|(t, n)| t.truncate().dot(*n).abs() <= TANGENT_PERPENDICULAR_TOLERANCE)
        });

        Surface {
            name: name.into(),
            bounds: Aabb::from_positions(&positions),
            positions,
            normals,
            tangents,
            uvs,
            colors,
            skin,
            indices,
            material,
            compress: compress && tangents_perpendicular,
        }
    }

    /// Drop all accumulated vertices.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices = None;
        self.eight_weights = false;
    }

    fn triangle_indices(&self) -> Vec<[usize; 3]> {
        match &self.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|c| [c[0] as usize, c[1] as usize, c[2] as usize])
                .collect(),
            None => (0..self.vertices.len() / 3)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect(),
        }
    }
}

fn smooth_key(vertex: &Vertex) -> [u32; 4] {
    let p = vertex.position;
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits(), vertex.smooth_group]
}

fn tangent_key(vertex: &Vertex) -> [u32; 8] {
    let p = vertex.position;
    let n = vertex.normal.unwrap_or(Vec3::ZERO);
    let uv = vertex.uv.unwrap_or(Vec2::ZERO);
    [p.x, p.y, p.z, n.x, n.y, n.z, uv.x, uv.y].map(f32::to_bits)
}

fn vertex_key(vertex: &Vertex) -> Vec<u32> {
    let mut key = Vec::with_capacity(24 + vertex.bones.len() * 2);
    push_attribute(&mut key, Some(vertex.position.to_array()));
    push_attribute(&mut key, vertex.normal.map(|n| n.to_array()));
    push_attribute(&mut key, vertex.tangent.map(|t| t.to_array()));
    push_attribute(&mut key, vertex.uv.map(|uv| uv.to_array()));
    push_attribute(&mut key, vertex.color.map(|c| c.to_array()));
    key.push(vertex.smooth_group);
    for &(bone, weight) in &vertex.bones {
        key.push(bone);
        key.push(weight.to_bits());
    }
    key
}

fn push_attribute<const N: usize>(key: &mut Vec<u32>, value: Option<[f32; N]>) {
    match value {
        Some(values) => {
            key.push(1);
            key.extend(values.iter().map(|f| f.to_bits()));
        }
        None => key.push(0),
    }
}

/// Sort, truncate, pad and normalize the influences of every vertex.
fn build_skin(vertices: &[Vertex], influences: SkinWeightCount) -> SkinWeights {
    let n = influences.count();
    let mut bones = Vec::with_capacity(vertices.len() * n);
    let mut weights = Vec::with_capacity(vertices.len() * n);

    for vertex in vertices {
        let mut sorted = vertex.bones.clone();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted.truncate(n);
        let total: f32 = sorted.iter().map(|(_, w)| w).sum();

        for slot in 0..n {
            let (bone, weight) = sorted.get(slot).copied().unwrap_or((0, 0.0));
            bones.push(bone);
            weights.push(if total > 0.0 { weight / total } else { 0.0 });
        }
    }

    SkinWeights {
        influences,
        bones,
        weights,
    }
}
