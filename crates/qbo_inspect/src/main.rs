//! Import OBJ/QBO files and print a summary of what was loaded.
//!
//! Run with: cargo run --bin qbo_inspect -- assets/cube.obj assets/rig.qbo

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use qbo_core::{load_obj_mesh, load_scene, Dialect, ImportOptions, Mesh, NodeKind, Scene};
use qbo_math::Vec3;
use rayon::prelude::*;

const USAGE: &str = "\
Usage: qbo_inspect [options] <file.obj|file.qbo>...

Options:
  --options <file.json>  Load import options from a JSON preset
  --mesh                 Import each OBJ as a single mesh
  --no-tangents          Don't generate tangents
  --scale x,y,z          Scale applied to vertex positions
  --offset x,y,z         Offset applied to vertex positions
  --verbose              Log at debug level";

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    files: Vec<PathBuf>,
    options_file: Option<PathBuf>,
    single_mesh: bool,
    no_tangents: bool,
    scale: Option<Vec3>,
    offset: Option<Vec3>,
    verbose: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--options" => {
                let value = args.next().context("--options needs a file")?;
                parsed.options_file = Some(PathBuf::from(value));
            }
            "--mesh" => parsed.single_mesh = true,
            "--no-tangents" => parsed.no_tangents = true,
            "--scale" => {
                let value = args.next().context("--scale needs x,y,z")?;
                parsed.scale = Some(parse_vec3(&value)?);
            }
            "--offset" => {
                let value = args.next().context("--offset needs x,y,z")?;
                parsed.offset = Some(parse_vec3(&value)?);
            }
            "--verbose" | "-v" => parsed.verbose = true,
            flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
            _ => parsed.files.push(PathBuf::from(arg)),
        }
    }

    Ok(parsed)
}

fn parse_vec3(value: &str) -> Result<Vec3> {
    let components = value
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid vector '{}'", value))?;
    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => bail!("expected 3 components in '{}'", value),
    }
}

/// Options from the preset file (if any) with command line overrides applied.
fn import_options(args: &Args) -> Result<ImportOptions> {
    let mut options = match &args.options_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading options from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing options from {}", path.display()))?
        }
        None => ImportOptions::default(),
    };

    if args.no_tangents {
        options.generate_tangents = false;
    }
    if let Some(scale) = args.scale {
        options.scale_mesh = scale;
    }
    if let Some(offset) = args.offset {
        options.offset_mesh = offset;
    }
    Ok(options)
}

fn describe_mesh(out: &mut String, mesh: &Mesh, indent: &str) {
    let _ = writeln!(
        out,
        "{}{} - {} vertices, {} triangles",
        indent,
        mesh.name,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    for surface in &mesh.surfaces {
        let _ = writeln!(
            out,
            "{}  surface '{}': {} triangles, material {}, compress {}",
            indent,
            surface.name,
            surface.triangle_count(),
            surface.material.as_ref().map_or("-", |m| m.name.as_str()),
            surface.compress
        );
    }
}

fn describe_scene(out: &mut String, scene: &Scene) {
    let _ = writeln!(out, "Scene '{}': {} meshes, {} triangles", scene.name, scene.mesh_count(), scene.total_triangle_count());

    for id in 0..scene.node_count() {
        let Some(node) = scene.node(id) else { continue };
        match &node.kind {
            NodeKind::Root => {}
            NodeKind::MeshInstance(instance) => {
                describe_mesh(out, &instance.mesh, "  ");
                if let Some(skin) = &instance.skin {
                    let _ = writeln!(out, "    skinned, {} binds", skin.bind_count());
                }
            }
            NodeKind::Skeleton(skeleton) => {
                let _ = writeln!(out, "  skeleton '{}': {} bones", skeleton.name, skeleton.bone_count());
            }
            NodeKind::AnimationPlayer(player) => {
                for library in player.libraries() {
                    for clip in library.animations() {
                        let _ = writeln!(
                            out,
                            "  clip '{}/{}': {:.2}s, {} tracks",
                            library.name,
                            clip.name,
                            clip.length,
                            clip.track_count()
                        );
                    }
                }
                if let Some(assigned) = &player.assigned {
                    let _ = writeln!(out, "  assigned: {}", assigned);
                }
            }
        }
    }

    let bounds = scene.bounds();
    if !bounds.is_empty() {
        let (min, max) = (bounds.min(), bounds.max());
        let _ = writeln!(
            out,
            "  bounds: ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }
}

/// Import one file and render its summary.
fn inspect(path: &Path, options: &ImportOptions, single_mesh: bool) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", path.display());

    if single_mesh {
        match Dialect::from_path(path) {
            Some(Dialect::Obj) => {}
            Some(Dialect::Qbo) => bail!("{}: --mesh only applies to .obj files", path.display()),
            None => bail!("{}: unsupported file extension", path.display()),
        }
        let mesh = load_obj_mesh(path, options)
            .with_context(|| format!("importing {}", path.display()))?;
        describe_mesh(&mut out, &mesh, "");
    } else {
        let imported = load_scene(path, options)
            .with_context(|| format!("importing {}", path.display()))?;
        describe_scene(&mut out, &imported.scene);
        for dep in &imported.missing_deps {
            let _ = writeln!(out, "  missing: {}", dep.display());
        }
    }
    Ok(out)
}

fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.files.is_empty() {
        println!("{}", USAGE);
        return Ok(());
    }

    let options = import_options(&args)?;
    log::debug!("Import options: {:?}", options);

    // Imports run in parallel; output keeps argument order
    let results: Vec<Result<String>> = args
        .files
        .par_iter()
        .map(|path| inspect(path, &options, args.single_mesh))
        .collect();

    let mut failures = 0;
    for result in results {
        match result {
            Ok(summary) => print!("{}", summary),
            Err(e) => {
                failures += 1;
                eprintln!("Error: {:#}", e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} imports failed", failures, args.files.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--mesh", "--scale", "2,2,2", "a.obj", "--verbose", "b.qbo"]).unwrap();
        assert!(parsed.single_mesh);
        assert!(parsed.verbose);
        assert_eq!(parsed.scale, Some(Vec3::splat(2.0)));
        assert_eq!(parsed.files, vec![PathBuf::from("a.obj"), PathBuf::from("b.qbo")]);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&["--scale"]).is_err());
        assert!(args(&["--scale", "1,2"]).is_err());
        assert!(args(&["--offset", "a,b,c"]).is_err());
        assert!(args(&["--bogus"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_defaults() {
        let parsed = args(&["--no-tangents", "--offset", "0,1,0", "a.obj"]).unwrap();
        let options = import_options(&parsed).unwrap();
        assert!(!options.generate_tangents);
        assert_eq!(options.offset_mesh, Vec3::Y);
        assert_eq!(options.scale_mesh, Vec3::ONE);
    }

    fn asset(name: &str) -> PathBuf {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
        Path::new(&manifest_dir).join("../../assets").join(name)
    }

    #[test]
    fn test_single_mesh_only_reads_obj() {
        let options = ImportOptions::default();
        let summary = inspect(&asset("cube.obj"), &options, true).unwrap();
        assert!(summary.contains("Mesh - 24 vertices, 12 triangles"));

        let err = inspect(&asset("rig.qbo"), &options, true).unwrap_err();
        assert!(err.to_string().contains("--mesh only applies to .obj files"));
        assert!(inspect(Path::new("scene.usda"), &options, true).is_err());
    }

    #[test]
    fn test_summary_of_fixture() {
        let path = asset("cube.obj");
        let summary = inspect(&path, &ImportOptions::default(), false).unwrap();
        assert!(summary.contains("Cube - 24 vertices, 12 triangles"));
        assert!(summary.contains("surface 'Red'"));
        assert!(summary.contains("missing:"));
    }
}
