//! BVH-style skeletal motion.
//!
//! A motion file holds one or more `HIERARCHY` sections, each declaring a
//! skeleton, followed by `MOTION` blocks of per-frame channel values. The
//! same grammar is embedded at the top of QBO files.
//!
//! # Example
//!
//! ```ignore
//! use qbo_core::bvh::{load_motion_library, library_name_from_path, MotionSettings};
//!
//! let settings = MotionSettings::for_bvh(library_name_from_path(path));
//! let motion = load_motion_library(path, settings)?;
//! println!("{} clips", motion.library.len());
//! ```

mod decode;
mod parser;

pub use parser::{
    Channel, ChannelTable, MotionError, MotionLibrary, MotionParser, MotionSettings,
    DEFAULT_FRAME_TIME,
};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ImportError, ImportResult};
use crate::reader::LineReader;

impl MotionSettings {
    /// Settings for a standalone `.bvh` referenced through `bvhlib`.
    pub fn for_bvh(library_name: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            quaternion_channels: false,
            name_skeletons_after_library: false,
            assign_clips: false,
            strip_dead_tracks: false,
        }
    }

    /// Settings for the motion section of a `.qbo` file.
    pub fn for_qbo(library_name: impl Into<String>, strip_dead_tracks: bool) -> Self {
        Self {
            library_name: library_name.into(),
            quaternion_channels: true,
            name_skeletons_after_library: true,
            assign_clips: true,
            strip_dead_tracks,
        }
    }
}

/// Library name for a motion file: the file name up to its first `.`, with
/// characters that are invalid in node names replaced by `_`.
pub fn library_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    stem.chars()
        .map(|c| match c {
            ':' | '@' | '/' | '"' | '%' => '_',
            c => c,
        })
        .collect()
}

/// Load a motion file from disk.
pub fn load_motion_library(path: &Path, settings: MotionSettings) -> ImportResult<MotionLibrary> {
    let file = File::open(path).map_err(|source| ImportError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loading motion library '{}'", path.display());
    parse_motion_library(LineReader::new(BufReader::new(file), path), settings)
}

/// Parse motion data until the end of input.
pub fn parse_motion_library<R: BufRead>(
    mut reader: LineReader<R>,
    settings: MotionSettings,
) -> ImportResult<MotionLibrary> {
    let mut parser = MotionParser::new(settings);
    while let Some(line) = reader.next_line()? {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parser
            .feed(&line)
            .map_err(|e| reader.corrupt(e.to_string()))?;
    }
    parser.finish().map_err(|e| reader.corrupt(e.to_string()))
}
