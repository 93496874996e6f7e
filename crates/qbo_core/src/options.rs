//! Import options shared by the OBJ and QBO importers.

use qbo_math::Vec3;
use serde::{Deserialize, Serialize};

/// Caller-controlled settings for one import job.
///
/// Missing fields fall back to [`ImportOptions::default`] when deserialized,
/// so a preset file only needs to list what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Synthesize tangents (from UVs when present, otherwise a fixed dummy).
    pub generate_tangents: bool,

    /// Per-axis scale applied to every `v` position before the offset.
    pub scale_mesh: Vec3,

    /// Offset added to every `v` position after scaling.
    pub offset_mesh: Vec3,

    /// Never mark surfaces as safe for attribute compression.
    pub disable_compression: bool,

    /// QBO only: build a skin and animation player when a skeleton exists.
    pub import_animation: bool,

    /// Remove tracks that never received a bone path.
    /// `None` keeps the dialect default (QBO strips, OBJ keeps).
    pub strip_dead_tracks: Option<bool>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            generate_tangents: true,
            scale_mesh: Vec3::ONE,
            offset_mesh: Vec3::ZERO,
            disable_compression: false,
            import_animation: true,
            strip_dead_tracks: None,
        }
    }
}

impl ImportOptions {
    /// Apply the configured scale and offset to a file position.
    #[inline]
    pub fn transform_position(&self, position: Vec3) -> Vec3 {
        position * self.scale_mesh + self.offset_mesh
    }
}
