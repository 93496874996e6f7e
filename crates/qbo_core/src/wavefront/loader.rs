//! High-level OBJ/QBO scene loading.
//!
//! The `load_*` functions open a file, parse it with [`parse_obj`] and
//! assemble the result into a [`Scene`]. The `read_*` variants take any
//! [`BufRead`] and a texture loader, for in-memory sources.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::obj::{parse_obj, ParsedObj};
use super::Dialect;
use crate::error::{ImportError, ImportResult};
use crate::mesh::Mesh;
use crate::options::ImportOptions;
use crate::reader::LineReader;
use crate::scene::{MeshInstance, NodeKind, Scene};
use crate::texture::{TextureCache, TextureLoader};

/// A loaded scene and the referenced files that could not be resolved.
#[derive(Clone, Debug)]
pub struct ImportedScene {
    pub scene: Scene,
    /// Material libraries, motion libraries and textures that failed to load
    pub missing_deps: Vec<PathBuf>,
}

/// Load a Wavefront OBJ file as a scene.
///
/// # Example
///
/// ```ignore
/// use qbo_core::{load_obj_scene, ImportOptions};
///
/// let imported = load_obj_scene("cube.obj", &ImportOptions::default())?;
/// println!("Loaded {} meshes", imported.scene.mesh_count());
/// ```
pub fn load_obj_scene<P: AsRef<Path>>(path: P, options: &ImportOptions) -> ImportResult<ImportedScene> {
    load_with_dialect(path.as_ref(), Dialect::Obj, options)
}

/// Load a QBO file (OBJ geometry with inline BVH motion) as a scene.
pub fn load_qbo_scene<P: AsRef<Path>>(path: P, options: &ImportOptions) -> ImportResult<ImportedScene> {
    load_with_dialect(path.as_ref(), Dialect::Qbo, options)
}

/// Load an `.obj` or `.qbo` file, picking the dialect from the extension.
pub fn load_scene<P: AsRef<Path>>(path: P, options: &ImportOptions) -> ImportResult<ImportedScene> {
    let path = path.as_ref();
    let dialect = Dialect::from_path(path)
        .ok_or_else(|| ImportError::UnsupportedFormat(path.display().to_string()))?;
    load_with_dialect(path, dialect, options)
}

/// Load an OBJ file as a single mesh, merging all of its objects.
pub fn load_obj_mesh<P: AsRef<Path>>(path: P, options: &ImportOptions) -> ImportResult<Mesh> {
    let path = path.as_ref();
    let reader = open(path)?;
    let mut textures = TextureCache::new();
    read_obj_mesh(reader, path, options, &mut textures)
}

/// Parse an OBJ stream as a single mesh.
///
/// `source` names the stream in errors; relative library paths resolve
/// against its parent directory.
pub fn read_obj_mesh<R: BufRead>(
    reader: R,
    source: &Path,
    options: &ImportOptions,
    textures: &mut dyn TextureLoader,
) -> ImportResult<Mesh> {
    let parsed = parse_obj(
        LineReader::new(reader, source),
        base_dir(source),
        Dialect::Obj,
        options,
        true,
        textures,
    )?;

    let mut meshes = parsed.meshes;
    match (meshes.pop(), meshes.is_empty()) {
        (Some(mesh), true) => Ok(mesh),
        (None, _) => Err(ImportError::Bug(format!("{}: no geometry", source.display()))),
        (Some(_), false) => Err(ImportError::Bug(format!(
            "{}: single-mesh import produced {} meshes",
            source.display(),
            meshes.len() + 1
        ))),
    }
}

/// Parse an OBJ or QBO stream into a scene.
pub fn read_scene<R: BufRead>(
    reader: R,
    source: &Path,
    dialect: Dialect,
    options: &ImportOptions,
    textures: &mut dyn TextureLoader,
) -> ImportResult<ImportedScene> {
    let parsed = parse_obj(
        LineReader::new(reader, source),
        base_dir(source),
        dialect,
        options,
        false,
        textures,
    )?;

    let name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    let missing_deps = parsed.missing_deps.clone();
    let scene = assemble_scene(parsed, name, dialect, options);

    log::info!(
        "Imported '{}': {} meshes, {} triangles, {} missing dependencies",
        source.display(),
        scene.mesh_count(),
        scene.total_triangle_count(),
        missing_deps.len()
    );
    Ok(ImportedScene {
        scene,
        missing_deps,
    })
}

fn load_with_dialect(path: &Path, dialect: Dialect, options: &ImportOptions) -> ImportResult<ImportedScene> {
    let reader = open(path)?;
    let mut textures = TextureCache::new();
    read_scene(reader, path, dialect, options, &mut textures)
}

fn open(path: &Path) -> ImportResult<BufReader<File>> {
    let file = File::open(path).map_err(|source| ImportError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn base_dir(source: &Path) -> &Path {
    source.parent().unwrap_or_else(|| Path::new(""))
}

/// Build the node tree for a parsed file.
///
/// Every skeleton becomes a child of the root. When the file carries skin
/// weights, all meshes are skinned against the first skeleton and placed
/// under it; otherwise they sit directly under the root.
fn assemble_scene(parsed: ParsedObj, name: &str, dialect: Dialect, options: &ImportOptions) -> Scene {
    let mut scene = Scene::new(name);
    let ParsedObj {
        meshes,
        skeletons,
        player,
        has_skin_weights,
        ..
    } = parsed;

    let skin_allowed = dialect == Dialect::Obj || options.import_animation;
    let skin = (has_skin_weights && skin_allowed)
        .then(|| skeletons.first().map(|s| Arc::new(s.create_skin_from_rest_transforms())))
        .flatten();

    let mut skeleton_nodes = Vec::with_capacity(skeletons.len());
    for skeleton in skeletons {
        let node_name = skeleton.name.clone();
        skeleton_nodes.push(scene.add_child(Scene::ROOT, &node_name, NodeKind::Skeleton(skeleton)));
    }

    for mesh in meshes {
        let mesh_name = mesh.name.clone();
        let mesh = Arc::new(mesh);
        let (parent, instance) = match (&skin, skeleton_nodes.first()) {
            (Some(skin), Some(&skeleton)) => (
                skeleton,
                MeshInstance {
                    mesh,
                    skin: Some(Arc::clone(skin)),
                    skeleton: Some(skeleton),
                },
            ),
            _ => (
                Scene::ROOT,
                MeshInstance {
                    mesh,
                    skin: None,
                    skeleton: None,
                },
            ),
        };
        scene.add_child(parent, &mesh_name, NodeKind::MeshInstance(instance));
    }

    if let Some(player) = player {
        if dialect == Dialect::Obj || options.import_animation {
            scene.add_child(Scene::ROOT, "AnimationPlayer", NodeKind::AnimationPlayer(player));
        }
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TrackKind;
    use crate::material::Transparency;
    use crate::testing::{test_asset_path, StubTextures};
    use qbo_math::{Vec3, Vec4};
    use std::io::Cursor;

    fn read(text: &str, dialect: Dialect, options: &ImportOptions) -> ImportResult<ImportedScene> {
        let mut textures = StubTextures::default();
        read_scene(
            Cursor::new(text.as_bytes().to_vec()),
            Path::new("memory/test.obj"),
            dialect,
            options,
            &mut textures,
        )
    }

    #[test]
    fn test_triangle_file() {
        let _ = env_logger::builder().is_test(true).try_init();

        let imported = load_obj_scene(test_asset_path("triangle.obj"), &ImportOptions::default()).unwrap();
        let scene = &imported.scene;
        assert_eq!(scene.name, "triangle");
        assert_eq!(scene.mesh_count(), 1);
        assert_eq!(scene.total_triangle_count(), 1);
        assert!(imported.missing_deps.is_empty());

        let (id, instance) = scene.mesh_instances().next().unwrap();
        assert_eq!(scene.node(id).unwrap().parent, Some(Scene::ROOT));
        assert!(instance.skin.is_none());
        for normal in &instance.mesh.surfaces[0].normals {
            assert!((*normal - Vec3::Z).length() < 0.001);
        }
    }

    #[test]
    fn test_material_from_library() {
        let text = "mtllib lib.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl M\nf 1 2 3\n";
        let mtl = "newmtl M\nKd 1 0 0\nd 0.5\n";

        let tmp = std::env::temp_dir().join(format!("qbo_loader_test_{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("lib.mtl"), mtl).unwrap();

        let mut textures = StubTextures::default();
        let imported = read_scene(
            Cursor::new(text.as_bytes().to_vec()),
            &tmp.join("scene.obj"),
            Dialect::Obj,
            &ImportOptions::default(),
            &mut textures,
        )
        .unwrap();
        std::fs::remove_dir_all(&tmp).ok();

        let (_, instance) = imported.scene.mesh_instances().next().unwrap();
        let surface = instance.mesh.surface("M").unwrap();
        let material = surface.material.as_ref().unwrap();
        assert_eq!(material.name, "M");
        assert_eq!(material.albedo, Vec4::new(1.0, 0.0, 0.0, 0.5));
        assert_eq!(material.transparency, Transparency::Alpha);
    }

    #[test]
    fn test_cube_fixture() {
        let imported = load_scene(test_asset_path("cube.obj"), &ImportOptions::default()).unwrap();
        let scene = &imported.scene;

        assert_eq!(scene.mesh_count(), 1);
        let (_, instance) = scene.mesh_instances().next().unwrap();
        assert_eq!(instance.mesh.name, "Cube");
        assert_eq!(instance.mesh.surface_count(), 2);
        assert_eq!(instance.mesh.triangle_count(), 12);
        // Flat shading with one normal per face: 4 unique vertices per quad
        assert_eq!(instance.mesh.vertex_count(), 24);

        let red = instance.mesh.surface("Red").unwrap();
        assert!(red.compress);
        assert!(red.tangents.is_some());
        // glass_albedo.png does not exist
        assert_eq!(imported.missing_deps.len(), 1);

        let bounds = scene.bounds();
        assert!((bounds.extent() - Vec3::ONE).length() < 0.001);
    }

    #[test]
    fn test_rigged_obj() {
        let imported = load_obj_scene(test_asset_path("rigged.obj"), &ImportOptions::default()).unwrap();
        let scene = &imported.scene;

        let (skeleton_id, skeleton) = scene.skeletons().next().unwrap();
        assert_eq!(skeleton.name, "Hips");

        let (id, instance) = scene.mesh_instances().next().unwrap();
        assert_eq!(scene.node(id).unwrap().parent, Some(skeleton_id));
        assert_eq!(instance.skeleton, Some(skeleton_id));
        assert_eq!(instance.skin.as_ref().unwrap().bind_count(), 3);
        assert_eq!(scene.find("Hips/Strip"), Some(id));

        let player = scene.animation_player().unwrap();
        let clip = player.animation("walk/walk_cycle").unwrap();
        assert!(clip.find_track("Hips:Spine", TrackKind::Rotation).is_some());
        // OBJ keeps the unbound position track of Spine
        assert_eq!(clip.track_count(), 4);
    }

    #[test]
    fn test_qbo_scene() {
        let imported = load_scene(test_asset_path("rig.qbo"), &ImportOptions::default()).unwrap();
        let scene = &imported.scene;

        let (skeleton_id, skeleton) = scene.skeletons().next().unwrap();
        assert_eq!(skeleton.name, "rig");
        assert_eq!(scene.node(skeleton_id).unwrap().name, "rig");

        let (_, instance) = scene.mesh_instances().next().unwrap();
        assert_eq!(instance.mesh.name, "QBO");
        assert!(instance.skin.is_some());
        assert!(instance.mesh.surface("Red").is_some());

        let player = scene.animation_player().unwrap();
        assert_eq!(player.assigned.as_deref(), Some("rig/MOTION"));
        let clip = player.animation("rig/MOTION").unwrap();
        assert_eq!(clip.track_count(), 3);

        let spine = clip.find_track("rig:Spine", TrackKind::Rotation).unwrap();
        let turned = spine.rotation_keys()[1].value;
        let expected = qbo_math::Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(turned.abs_diff_eq(expected, 0.001));
    }

    #[test]
    fn test_qbo_without_animation() {
        let mut options = ImportOptions::default();
        options.import_animation = false;
        let imported = load_qbo_scene(test_asset_path("rig.qbo"), &options).unwrap();

        let (id, instance) = imported.scene.mesh_instances().next().unwrap();
        assert!(instance.skin.is_none());
        assert_eq!(imported.scene.node(id).unwrap().parent, Some(Scene::ROOT));
        assert!(imported.scene.animation_player().is_none());
    }

    #[test]
    fn test_single_mesh_import() {
        let mesh = load_obj_mesh(test_asset_path("cube.obj"), &ImportOptions::default()).unwrap();
        assert_eq!(mesh.name, "Mesh");
        assert_eq!(mesh.surface_count(), 2);

        let mut textures = StubTextures::default();
        let empty = read_obj_mesh(Cursor::new(b"# nothing\n".to_vec()), Path::new("empty.obj"), &ImportOptions::default(), &mut textures);
        assert!(matches!(empty, Err(ImportError::Bug(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_scene("scene.usda", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_obj_scene("/nonexistent/model.obj", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::CannotOpen { .. }));
    }

    #[test]
    fn test_parse_error_returns_no_scene() {
        let err = read("v 0 0 0\nf 1 2 9\n", Dialect::Obj, &ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("memory/test.obj:2"));
    }
}
