//! Scene tree produced by an import.
//!
//! Nodes live in an arena owned by [`Scene`]; index 0 is always the root.
//! Sibling names are unique, so a node can be addressed by its path.

use std::sync::Arc;

use qbo_math::{Aabb, Mat4, Mat4Ext, Quat, Vec3};

use crate::animation::AnimationPlayer;
use crate::mesh::Mesh;
use crate::skeleton::{Skeleton, Skin};

/// Index of a node in its [`Scene`].
pub type NodeId = usize;

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Convert to a 4x4 matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A mesh placed in the scene, optionally deformed by a skeleton.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub mesh: Arc<Mesh>,
    pub skin: Option<Arc<Skin>>,
    /// Skeleton node driving the skin
    pub skeleton: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Root,
    MeshInstance(MeshInstance),
    Skeleton(Skeleton),
    AnimationPlayer(AnimationPlayer),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    pub kind: NodeKind,
}

/// An imported scene: a root node and everything under it.
#[derive(Clone, Debug)]
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,
    nodes: Vec<Node>,
}

impl Scene {
    /// Create a scene holding only its root node.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let root = Node {
            name: name.clone(),
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            kind: NodeKind::Root,
        };
        Self {
            name,
            nodes: vec![root],
        }
    }

    pub const ROOT: NodeId = 0;

    /// Add a node under `parent` and return its id.
    ///
    /// If a sibling already uses `name`, a numeric suffix starting at 2 is
    /// appended.
    pub fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let name = self.unique_child_name(parent, name);
        let id = self.nodes.len();
        self.nodes.push(Node {
            name,
            parent: Some(parent),
            children: Vec::new(),
            transform: Transform::default(),
            kind,
        });
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    fn unique_child_name(&self, parent: NodeId, name: &str) -> String {
        let taken = |candidate: &str| {
            self.children(parent)
                .iter()
                .any(|&child| self.nodes[child].name == candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{}{}", name, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find a node by its `/`-separated path of names below the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(Self::ROOT, |id, part| {
                self.children(id)
                    .iter()
                    .copied()
                    .find(|&child| self.nodes[child].name == part)
            })
    }

    /// All mesh instances in insertion order.
    pub fn mesh_instances(&self) -> impl Iterator<Item = (NodeId, &MeshInstance)> {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match &node.kind {
            NodeKind::MeshInstance(instance) => Some((id, instance)),
            _ => None,
        })
    }

    pub fn skeletons(&self) -> impl Iterator<Item = (NodeId, &Skeleton)> {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match &node.kind {
            NodeKind::Skeleton(skeleton) => Some((id, skeleton)),
            _ => None,
        })
    }

    pub fn animation_player(&self) -> Option<&AnimationPlayer> {
        self.nodes.iter().find_map(|node| match &node.kind {
            NodeKind::AnimationPlayer(player) => Some(player),
            _ => None,
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_instances().count()
    }

    /// Get total triangle count across all mesh instances.
    pub fn total_triangle_count(&self) -> usize {
        self.mesh_instances()
            .map(|(_, instance)| instance.mesh.triangle_count())
            .sum()
    }

    /// Transform of `id` relative to the scene root.
    pub fn global_transform(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            matrix = node.transform.to_matrix() * matrix;
            current = node.parent.and_then(|p| self.nodes.get(p));
        }
        matrix
    }

    /// Bounds of every mesh instance in root space.
    pub fn bounds(&self) -> Aabb {
        self.mesh_instances().fold(Aabb::empty(), |bounds, (id, instance)| {
            let local = instance.mesh.bounds();
            Aabb::surrounding(&bounds, &self.global_transform(id).transform_aabb(&local))
        })
    }
}
