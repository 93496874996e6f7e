//! QBO Core - OBJ, QBO and BVH asset import.
//!
//! This crate provides:
//!
//! - **Wavefront import**: `.obj` geometry with `.mtl` material libraries
//! - **QBO import**: OBJ geometry with inline BVH skeletons and skin weights
//! - **Motion import**: BVH hierarchies and clips referenced through `bvhlib`
//! - **Scene types**: `Scene`, `Mesh`, `Material`, `Skeleton`, `AnimationPlayer`
//!
//! # Example
//!
//! ```ignore
//! use qbo_core::{load_scene, ImportOptions};
//!
//! let imported = load_scene("character.qbo", &ImportOptions::default())?;
//! println!("Loaded {} meshes, {} triangles",
//!     imported.scene.mesh_count(),
//!     imported.scene.total_triangle_count());
//! for path in &imported.missing_deps {
//!     println!("missing: {}", path.display());
//! }
//! ```

pub mod animation;
pub mod bvh;
pub mod error;
pub mod material;
pub mod mesh;
pub mod options;
pub mod reader;
pub mod scene;
pub mod skeleton;
pub mod surface_tool;
pub mod texture;
pub mod tokens;
pub mod wavefront;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use animation::{Animation, AnimationLibrary, AnimationPlayer, Track, TrackKind};
pub use error::{ImportError, ImportResult};
pub use material::{Material, TextureSlot, Transparency};
pub use mesh::{Mesh, Surface};
pub use options::ImportOptions;
pub use scene::{MeshInstance, Node, NodeId, NodeKind, Scene, Transform};
pub use skeleton::{Bone, Skeleton, Skin};
pub use texture::{ColorSpace, Texture, TextureCache, TextureLoader};
pub use wavefront::{
    load_obj_mesh, load_obj_scene, load_qbo_scene, load_scene, read_obj_mesh, read_scene,
    Dialect, ImportedScene,
};
