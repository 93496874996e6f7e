//! Wavefront OBJ and its QBO skinning dialect.
//!
//! Both formats share one line grammar ([`obj`]) and the MTL material
//! library parser ([`mtl`]). QBO additionally embeds BVH motion data at the
//! top of the file and counts vertices and bones from 1 in `vw` lines.

pub mod geometry;
pub mod loader;
pub mod mtl;
pub mod obj;

pub use geometry::{resolve_index, FaceError, FaceRef, SourceBuffers};
pub use loader::{
    load_obj_mesh, load_obj_scene, load_qbo_scene, load_scene, read_obj_mesh, read_scene,
    ImportedScene,
};
pub use mtl::{load_material_library, parse_material_library, MaterialMap};
pub use obj::{parse_obj, ParsedObj};

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which flavor of the OBJ grammar a file is read with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Obj,
    Qbo,
}

impl Dialect {
    /// Pick the dialect from a file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(Dialect::Obj),
            "qbo" => Some(Dialect::Qbo),
            _ => None,
        }
    }

    /// Name given to meshes that no `o` line names.
    pub fn default_mesh_name(self) -> &'static str {
        match self {
            Dialect::Obj => "Mesh",
            Dialect::Qbo => "QBO",
        }
    }

    /// Whether dead animation tracks are stripped when the options don't say.
    pub fn strips_dead_tracks(self) -> bool {
        self == Dialect::Qbo
    }

    /// `vw` vertex token to a 0-based source vertex index.
    ///
    /// OBJ counts from 0, QBO from 1. Anything below the base is rejected.
    pub fn vertex_index(self, raw: i64) -> Option<usize> {
        let index = match self {
            Dialect::Obj => raw,
            Dialect::Qbo => raw - 1,
        };
        usize::try_from(index).ok()
    }

    /// Numeric `vw` bone token to a 0-based bone index.
    pub fn bone_index(self, raw: i64) -> Option<u32> {
        let index = match self {
            Dialect::Obj => raw,
            Dialect::Qbo => raw - 1,
        };
        u32::try_from(index).ok()
    }
}
