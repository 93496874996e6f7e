//! MTL material library parser.
//!
//! Classic Phong attributes are mapped onto the PBR-style [`Material`]:
//!
//! - `Kd r g b` sets the albedo color
//! - `Ks r g b` sets metallic to the brightest channel
//! - `Ns s` sets metallic to `(1000 - s) / 1000`
//! - `d a` / `Tr t` set alpha (`Tr` is `1 - d`)
//! - `map_Kd`, `map_Ks`, `map_Ns`, `map_bump` fill texture slots
//!
//! `Ka` and `map_Ka` have no counterpart and are skipped with a warning.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ImportError, ImportResult};
use crate::material::{Material, TextureRef, TextureSlot};
use crate::reader::LineReader;
use crate::texture::TextureLoader;
use crate::tokens;

/// Materials of one library, by `newmtl` name.
pub type MaterialMap = HashMap<String, Arc<Material>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MtlDirective {
    NewMaterial,
    Ambient,
    Diffuse,
    Specular,
    Shininess,
    Dissolve,
    Transparency,
    Map(TextureSlot),
    AmbientMap,
    Unknown,
}

impl MtlDirective {
    fn classify(keyword: &str) -> Self {
        match keyword {
            "newmtl" => MtlDirective::NewMaterial,
            "Ka" => MtlDirective::Ambient,
            "Kd" => MtlDirective::Diffuse,
            "Ks" => MtlDirective::Specular,
            "Ns" => MtlDirective::Shininess,
            "d" => MtlDirective::Dissolve,
            "Tr" => MtlDirective::Transparency,
            "map_Kd" => MtlDirective::Map(TextureSlot::Albedo),
            "map_Ks" => MtlDirective::Map(TextureSlot::Metallic),
            "map_Ns" => MtlDirective::Map(TextureSlot::Roughness),
            "map_bump" => MtlDirective::Map(TextureSlot::Normal),
            "map_Ka" => MtlDirective::AmbientMap,
            _ => MtlDirective::Unknown,
        }
    }
}

/// Open and parse a material library file.
///
/// Texture paths are resolved relative to the library's directory. Textures
/// that fail to load are appended to `missing_deps`.
pub fn load_material_library(
    path: &Path,
    textures: &mut dyn TextureLoader,
    missing_deps: &mut Vec<PathBuf>,
) -> ImportResult<MaterialMap> {
    let file = File::open(path).map_err(|source| ImportError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let reader = LineReader::new(BufReader::new(file), path);
    parse_material_library(reader, base_dir, textures, missing_deps)
}

/// Parse a material library from any line source.
pub fn parse_material_library<R: BufRead>(
    mut reader: LineReader<R>,
    base_dir: &Path,
    textures: &mut dyn TextureLoader,
    missing_deps: &mut Vec<PathBuf>,
) -> ImportResult<MaterialMap> {
    let mut materials = MaterialMap::new();
    let mut current: Option<Material> = None;

    while let Some(line) = reader.next_line()? {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens = tokens::split(&line);
        let keyword = tokens[0];

        match MtlDirective::classify(keyword) {
            MtlDirective::NewMaterial => {
                if let Some(done) = current.take() {
                    materials.insert(done.name.clone(), Arc::new(done));
                }
                current = Some(Material::new(tokens::remainder(&line, keyword)));
            }
            MtlDirective::Ambient => {
                log::warn!("{}: Ka is not supported, ignoring", reader.source().display());
            }
            MtlDirective::AmbientMap => {
                log::warn!("{}: map_Ka is not supported, ignoring", reader.source().display());
            }
            MtlDirective::Unknown => {
                log::debug!("{}: skipping '{}'", reader.source().display(), keyword);
            }
            directive => {
                let material = current
                    .as_mut()
                    .ok_or_else(|| reader.corrupt(format!("'{}' before any newmtl", keyword)))?;
                apply_attribute(directive, &line, &tokens, material, &reader, base_dir, textures, missing_deps)?;
            }
        }
    }

    if let Some(done) = current.take() {
        materials.insert(done.name.clone(), Arc::new(done));
    }

    log::debug!(
        "Loaded {} material(s) from {}",
        materials.len(),
        reader.source().display()
    );
    Ok(materials)
}

#[allow(clippy::too_many_arguments)]
fn apply_attribute<R: BufRead>(
    directive: MtlDirective,
    line: &str,
    tokens: &[&str],
    material: &mut Material,
    reader: &LineReader<R>,
    base_dir: &Path,
    textures: &mut dyn TextureLoader,
    missing_deps: &mut Vec<PathBuf>,
) -> ImportResult<()> {
    match directive {
        MtlDirective::Diffuse => {
            let [r, g, b] = color_components(tokens).ok_or_else(|| reader.invalid("invalid albedo color"))?;
            material.albedo.x = r;
            material.albedo.y = g;
            material.albedo.z = b;
        }
        MtlDirective::Specular => {
            let [r, g, b] = color_components(tokens).ok_or_else(|| reader.invalid("invalid specular color"))?;
            material.metallic = r.max(g).max(b);
        }
        MtlDirective::Shininess => {
            let shininess = single_value(tokens).ok_or_else(|| reader.invalid("invalid shininess"))?;
            material.metallic = (1000.0 - shininess) / 1000.0;
        }
        MtlDirective::Dissolve => {
            let alpha = single_value(tokens).ok_or_else(|| reader.invalid("invalid dissolve"))?;
            material.set_alpha(alpha);
        }
        MtlDirective::Transparency => {
            let transparency = single_value(tokens).ok_or_else(|| reader.invalid("invalid transparency"))?;
            material.set_alpha(1.0 - transparency);
        }
        MtlDirective::Map(slot) => {
            let relative = tokens::remainder(line, tokens[0]).replace('\\', "/");
            if relative.is_empty() {
                return Err(reader.invalid(format!("'{}' without a path", tokens[0])));
            }
            let path = resolve_texture_path(base_dir, &relative);
            match textures.load_texture(&path, slot.color_space()) {
                Some(texture) => material.set_texture(slot, TextureRef { path, texture }),
                None => {
                    log::warn!("Missing texture for material '{}': {}", material.name, path.display());
                    missing_deps.push(path);
                }
            }
        }
        MtlDirective::NewMaterial
        | MtlDirective::Ambient
        | MtlDirective::AmbientMap
        | MtlDirective::Unknown => {}
    }
    Ok(())
}

fn color_components(tokens: &[&str]) -> Option<[f32; 3]> {
    (tokens.len() >= 4).then(|| {
        [
            tokens::to_float(tokens[1]),
            tokens::to_float(tokens[2]),
            tokens::to_float(tokens[3]),
        ]
    })
}

fn single_value(tokens: &[&str]) -> Option<f32> {
    (tokens.len() == 2).then(|| tokens::to_float(tokens[1]))
}

/// Resolve a texture path relative to the library directory unless absolute.
fn resolve_texture_path(base_dir: &Path, relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
