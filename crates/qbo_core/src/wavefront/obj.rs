//! OBJ/QBO line grammar.
//!
//! [`parse_obj`] walks the file once, filling [`SourceBuffers`] from vertex
//! directives and fanning every `f` line into the current [`SurfaceBuilder`].
//! A surface is committed at `usemtl`, `o` and end of file. Material and
//! motion libraries are loaded on first reference and cached by name.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qbo_math::{Vec2, Vec3};

use super::geometry::{FaceContext, SourceBuffers};
use super::mtl::{load_material_library, MaterialMap};
use super::Dialect;
use crate::animation::AnimationPlayer;
use crate::bvh::{self, MotionLibrary, MotionParser, MotionSettings};
use crate::error::ImportResult;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::options::ImportOptions;
use crate::reader::LineReader;
use crate::skeleton::Skeleton;
use crate::surface_tool::{SurfaceBuilder, NO_SMOOTHING};
use crate::texture::TextureLoader;
use crate::tokens;

/// Everything one OBJ or QBO file produced, before scene assembly.
#[derive(Debug, Default)]
pub struct ParsedObj {
    pub meshes: Vec<Mesh>,
    pub skeletons: Vec<Skeleton>,
    pub player: Option<AnimationPlayer>,
    /// Referenced files that could not be loaded
    pub missing_deps: Vec<PathBuf>,
    /// At least one `vw` line assigned a weight
    pub has_skin_weights: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjDirective {
    Position,
    TexCoord,
    Normal,
    Weight,
    Face,
    Smoothing,
    Group,
    Object,
    UseMaterial,
    MaterialLibrary,
    MotionLibrary,
    Hierarchy,
    Unknown,
}

impl ObjDirective {
    fn classify(keyword: &str) -> Self {
        match keyword {
            "v" => ObjDirective::Position,
            "vt" => ObjDirective::TexCoord,
            "vn" => ObjDirective::Normal,
            "vw" => ObjDirective::Weight,
            "f" => ObjDirective::Face,
            "s" => ObjDirective::Smoothing,
            "g" => ObjDirective::Group,
            "o" => ObjDirective::Object,
            "usemtl" => ObjDirective::UseMaterial,
            "mtllib" => ObjDirective::MaterialLibrary,
            "bvhlib" => ObjDirective::MotionLibrary,
            "HIERARCHY" => ObjDirective::Hierarchy,
            _ => ObjDirective::Unknown,
        }
    }

    /// Directives that end an inline motion section.
    fn is_geometry(self) -> bool {
        !matches!(
            self,
            ObjDirective::MotionLibrary | ObjDirective::Hierarchy | ObjDirective::Unknown
        )
    }
}

/// Parse an OBJ or QBO stream.
///
/// `base_dir` is the directory `mtllib` and `bvhlib` paths are relative to.
/// With `single_mesh` every object is merged into one mesh. Any malformed
/// geometry line aborts the whole parse.
pub fn parse_obj<R: BufRead>(
    mut reader: LineReader<R>,
    base_dir: &Path,
    dialect: Dialect,
    options: &ImportOptions,
    single_mesh: bool,
    textures: &mut dyn TextureLoader,
) -> ImportResult<ParsedObj> {
    reader.check_text_header()?;

    let mut parser = ObjParser::new(dialect, options, single_mesh, base_dir, textures);
    let mut handed_back: Option<String> = None;

    loop {
        let line = match handed_back.take() {
            Some(line) => line,
            None => match reader.next_line()? {
                Some(line) => line,
                None => break,
            },
        };
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens = tokens::split(&line);
        let directive = ObjDirective::classify(tokens[0]);
        if directive == ObjDirective::Hierarchy && dialect == Dialect::Qbo {
            handed_back = parser.motion_section(&line, &mut reader)?;
        } else {
            parser.directive(directive, &line, &tokens, &reader)?;
        }
    }

    Ok(parser.finish())
}

struct ObjParser<'a> {
    dialect: Dialect,
    options: &'a ImportOptions,
    single_mesh: bool,
    base_dir: PathBuf,
    textures: &'a mut dyn TextureLoader,

    buffers: SourceBuffers,
    builder: SurfaceBuilder,
    mesh: Mesh,
    meshes: Vec<Mesh>,

    material_libraries: HashMap<String, MaterialMap>,
    motion_libraries: HashSet<String>,
    current_library: String,
    current_material: String,
    current_group: String,
    smoothing: bool,
    smooth_group: u32,

    skeletons: Vec<Skeleton>,
    player: Option<AnimationPlayer>,
    missing_deps: Vec<PathBuf>,
}

impl<'a> ObjParser<'a> {
    fn new(
        dialect: Dialect,
        options: &'a ImportOptions,
        single_mesh: bool,
        base_dir: &Path,
        textures: &'a mut dyn TextureLoader,
    ) -> Self {
        Self {
            dialect,
            options,
            single_mesh,
            base_dir: base_dir.to_path_buf(),
            textures,
            buffers: SourceBuffers::new(),
            builder: SurfaceBuilder::new(),
            mesh: Mesh::new(dialect.default_mesh_name()),
            meshes: Vec::new(),
            material_libraries: HashMap::new(),
            motion_libraries: HashSet::new(),
            current_library: String::new(),
            current_material: String::new(),
            current_group: String::new(),
            smoothing: true,
            smooth_group: 0,
            skeletons: Vec::new(),
            player: None,
            missing_deps: Vec::new(),
        }
    }

    fn strip_dead_tracks(&self) -> bool {
        self.options
            .strip_dead_tracks
            .unwrap_or_else(|| self.dialect.strips_dead_tracks())
    }

    fn directive<R: BufRead>(
        &mut self,
        directive: ObjDirective,
        line: &str,
        tokens: &[&str],
        reader: &LineReader<R>,
    ) -> ImportResult<()> {
        match directive {
            ObjDirective::Position => {
                if tokens.len() < 4 {
                    return Err(reader.corrupt("invalid vertex position"));
                }
                let position = self.options.transform_position(float3(&tokens[1..4]));
                let color = (tokens.len() >= 7).then(|| float3(&tokens[4..7]).extend(1.0));
                self.buffers.push_position(position, color);
            }
            ObjDirective::TexCoord => {
                if tokens.len() < 3 {
                    return Err(reader.corrupt("invalid texture coordinate"));
                }
                let u = tokens::to_float(tokens[1]);
                let v = tokens::to_float(tokens[2]);
                self.buffers.uvs.push(Vec2::new(u, 1.0 - v));
            }
            ObjDirective::Normal => {
                if tokens.len() < 4 {
                    return Err(reader.corrupt("invalid vertex normal"));
                }
                self.buffers.normals.push(float3(&tokens[1..4]));
            }
            ObjDirective::Weight => self.vertex_weights(tokens, reader)?,
            ObjDirective::Face => {
                if tokens.len() < 4 {
                    return Err(reader.corrupt("face needs at least 3 vertices"));
                }
                let corners = self
                    .buffers
                    .parse_face(&tokens[1..])
                    .map_err(|e| reader.corrupt(e.to_string()))?;
                let context = FaceContext {
                    smooth_group: if self.smoothing { self.smooth_group } else { NO_SMOOTHING },
                    dummy_tangents: self.options.generate_tangents && self.buffers.uvs.is_empty(),
                };
                self.buffers.emit_face(&corners, context, &mut self.builder);
            }
            ObjDirective::Smoothing => {
                let off = tokens.get(1).is_some_and(|t| *t == "off");
                if off {
                    self.smoothing = false;
                } else if !self.smoothing {
                    self.smoothing = true;
                    self.smooth_group += 1;
                }
            }
            ObjDirective::Group => {
                self.current_group = tokens::remainder(line, tokens[0]).to_string();
            }
            ObjDirective::Object => {
                self.commit_surface();
                if !self.single_mesh {
                    self.finish_mesh();
                    let name = tokens::remainder(line, tokens[0]);
                    if !name.is_empty() {
                        self.mesh.name = name.to_string();
                    }
                }
            }
            ObjDirective::UseMaterial => {
                self.commit_surface();
                self.current_material = tokens::remainder(line, tokens[0]).to_string();
            }
            ObjDirective::MaterialLibrary => {
                let name = tokens::remainder(line, tokens[0]).to_string();
                self.material_library(&name);
                self.current_library = name;
            }
            ObjDirective::MotionLibrary if self.dialect == Dialect::Obj => {
                let name = tokens::remainder(line, tokens[0]).to_string();
                self.motion_library(&name);
            }
            ObjDirective::MotionLibrary | ObjDirective::Hierarchy | ObjDirective::Unknown => {
                log::debug!("{}: skipping '{}'", reader.source().display(), tokens[0]);
            }
        }
        Ok(())
    }

    /// `vw <vertex> (<bone> <weight>)+`
    fn vertex_weights<R: BufRead>(
        &mut self,
        tokens: &[&str],
        reader: &LineReader<R>,
    ) -> ImportResult<()> {
        if tokens.len() < 4 || tokens.len() % 2 != 0 {
            return Err(reader.corrupt("invalid vertex weight line"));
        }
        if self.dialect == Dialect::Qbo && self.skeletons.is_empty() {
            return Err(reader.corrupt("vertex weights without a skeleton"));
        }

        let raw = tokens::to_int(tokens[1]);
        let vertex = self
            .dialect
            .vertex_index(raw)
            .ok_or_else(|| reader.corrupt(format!("vertex weight index {} out of range", raw)))?;

        for pair in tokens[2..].chunks_exact(2) {
            let (bone_token, weight) = (pair[0], tokens::to_float(pair[1]));
            let bone = if tokens::is_integer(bone_token) {
                let bone = self.dialect.bone_index(tokens::to_int(bone_token));
                if bone.is_none() {
                    log::debug!("Dropping weight for bone index {}", bone_token);
                }
                bone
            } else {
                match self.find_bone(bone_token) {
                    Some(bone) => Some(bone),
                    None if self.dialect == Dialect::Qbo => {
                        return Err(reader.corrupt(format!("unknown bone '{}'", bone_token)));
                    }
                    None => {
                        log::warn!("Dropping weight for unknown bone '{}'", bone_token);
                        None
                    }
                }
            };
            if let Some(bone) = bone {
                self.buffers.set_weight(vertex, bone, weight);
            }
        }
        Ok(())
    }

    /// Named bones bind to the most recently declared skeleton.
    fn find_bone(&self, name: &str) -> Option<u32> {
        let bone = self.skeletons.last()?.find_bone(name)?;
        u32::try_from(bone).ok()
    }

    fn material_library(&mut self, name: &str) {
        if self.material_libraries.contains_key(name) {
            return;
        }
        let path = resolve_library_path(&self.base_dir, name);
        match load_material_library(&path, &mut *self.textures, &mut self.missing_deps) {
            Ok(materials) => {
                self.material_libraries.insert(name.to_string(), materials);
            }
            Err(e) => {
                log::warn!("Skipping material library '{}': {}", name, e);
                self.missing_deps.push(path);
            }
        }
    }

    fn motion_library(&mut self, name: &str) {
        if self.motion_libraries.contains(name) {
            return;
        }
        let path = resolve_library_path(&self.base_dir, name);
        let mut settings = MotionSettings::for_bvh(bvh::library_name_from_path(&path));
        settings.strip_dead_tracks = self.strip_dead_tracks();

        match bvh::load_motion_library(&path, settings) {
            Ok(motion) => {
                self.motion_libraries.insert(name.to_string());
                self.add_motion(motion);
            }
            Err(e) => {
                log::warn!("Skipping motion library '{}': {}", name, e);
                self.missing_deps.push(path);
            }
        }
    }

    /// Read an inline motion section starting at its `HIERARCHY` line.
    ///
    /// The section runs until the second blank line or end of input. A
    /// geometry directive outside of frame data also ends it and is handed
    /// back to the caller.
    fn motion_section<R: BufRead>(
        &mut self,
        first: &str,
        reader: &mut LineReader<R>,
    ) -> ImportResult<Option<String>> {
        let library_name = bvh::library_name_from_path(reader.source());
        let mut motion = MotionParser::new(MotionSettings::for_qbo(
            library_name,
            self.strip_dead_tracks(),
        ));
        motion.feed(first).map_err(|e| reader.corrupt(e.to_string()))?;

        let mut blanks = 0;
        let mut handed_back = None;
        while let Some(line) = reader.next_line()? {
            if line.is_empty() {
                blanks += 1;
                if blanks > 1 {
                    break;
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let keyword = tokens::split(&line)[0];
            if !motion.in_motion() && ObjDirective::classify(keyword).is_geometry() {
                handed_back = Some(line);
                break;
            }
            motion.feed(&line).map_err(|e| reader.corrupt(e.to_string()))?;
        }

        let library = motion.finish().map_err(|e| reader.corrupt(e.to_string()))?;
        self.add_motion(library);
        Ok(handed_back)
    }

    fn add_motion(&mut self, motion: MotionLibrary) {
        log::debug!(
            "Adding {} skeleton(s) and {} clip(s) from '{}'",
            motion.skeletons.len(),
            motion.library.len(),
            motion.library.name
        );
        self.skeletons.extend(motion.skeletons);

        let player = self.player.get_or_insert_with(AnimationPlayer::new);
        let name = motion.library.name.clone();
        player.library_mut(&name).merge(motion.library);
        if motion.assigned.is_some() {
            player.assigned = motion.assigned;
        }
    }

    /// The material bound by the last `usemtl`, if its library resolves it.
    fn bound_material(&mut self, vertex_colors: bool) -> Option<Arc<Material>> {
        let material = self
            .material_libraries
            .get_mut(&self.current_library)?
            .get_mut(&self.current_material)?;
        if vertex_colors && !material.vertex_color_is_srgb {
            Arc::make_mut(material).vertex_color_is_srgb = true;
        }
        Some(Arc::clone(material))
    }

    fn commit_surface(&mut self) {
        if self.builder.is_empty() {
            return;
        }

        let compress = !self.options.disable_compression && !self.buffers.is_flat();
        if self.builder.needs_normals() {
            self.builder.generate_normals();
        }
        if self.options.generate_tangents && !self.buffers.uvs.is_empty() {
            self.builder.generate_tangents();
        }

        let material = self.bound_material(self.builder.has_colors());
        let name = if !self.current_material.is_empty() {
            strip_extension(&self.current_material).to_string()
        } else if !self.current_group.is_empty() {
            self.current_group.clone()
        } else {
            self.mesh.name.clone()
        };

        let surface = self.builder.commit(name, material, compress);
        log::debug!(
            "Committed surface '{}' ({} vertices, {} triangles)",
            surface.name,
            surface.vertex_count(),
            surface.triangle_count()
        );
        self.mesh.add_surface(surface);
    }

    fn finish_mesh(&mut self) {
        let mesh = std::mem::replace(&mut self.mesh, Mesh::new(self.dialect.default_mesh_name()));
        if mesh.surface_count() > 0 {
            self.meshes.push(mesh);
        }
        self.current_group.clear();
        self.current_material.clear();
    }

    fn finish(mut self) -> ParsedObj {
        self.commit_surface();
        if self.single_mesh {
            if self.mesh.surface_count() > 0 {
                let mesh = std::mem::replace(&mut self.mesh, Mesh::new(""));
                self.meshes.push(mesh);
            }
        } else {
            self.finish_mesh();
        }

        ParsedObj {
            meshes: self.meshes,
            skeletons: self.skeletons,
            player: self.player,
            missing_deps: self.missing_deps,
            has_skin_weights: self.buffers.has_weights(),
        }
    }
}

fn float3(tokens: &[&str]) -> Vec3 {
    Vec3::new(
        tokens::to_float(tokens[0]),
        tokens::to_float(tokens[1]),
        tokens::to_float(tokens[2]),
    )
}

fn resolve_library_path(base_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Drop the extension of a material name, leaving any directory part alone.
fn strip_extension(name: &str) -> &str {
    let separator = name.rfind(|c: char| c == '/' || c == '\\');
    match name.rfind('.') {
        Some(dot) if separator.map_or(true, |sep| dot > sep) => &name[..dot],
        _ => name,
    }
}
