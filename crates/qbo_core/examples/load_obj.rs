//! Example: Load and inspect an OBJ or QBO file.
//!
//! Run with: cargo run --example load_obj -- assets/cube.obj

use std::env;

use qbo_core::{load_scene, ImportOptions, NodeKind};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: load_obj <path-to-obj-or-qbo-file>");
        println!("\nExamples:");
        println!("  cargo run --example load_obj -- assets/cube.obj");
        println!("  cargo run --example load_obj -- assets/rigged.obj");
        println!("  cargo run --example load_obj -- assets/rig.qbo");
        return;
    }

    let path = &args[1];
    println!("Loading file: {}", path);

    match load_scene(path, &ImportOptions::default()) {
        Ok(imported) => {
            let scene = &imported.scene;
            println!("\n=== Scene: {} ===", scene.name);
            println!("Meshes: {}", scene.mesh_count());
            println!("Total triangles: {}", scene.total_triangle_count());

            println!("\n--- Meshes ---");
            for (id, instance) in scene.mesh_instances() {
                let mesh = &instance.mesh;
                println!(
                    "  [{}] {} - {} vertices, {} triangles, skinned: {}",
                    id,
                    mesh.name,
                    mesh.vertex_count(),
                    mesh.triangle_count(),
                    instance.skin.is_some()
                );
                for surface in &mesh.surfaces {
                    println!(
                        "       {} ({} triangles, material: {})",
                        surface.name,
                        surface.triangle_count(),
                        surface.material.as_ref().map_or("-", |m| m.name.as_str())
                    );
                }
            }

            println!("\n--- Nodes ---");
            for id in 0..scene.node_count() {
                if let Some(node) = scene.node(id) {
                    let kind = match &node.kind {
                        NodeKind::Root => "Root".to_string(),
                        NodeKind::MeshInstance(_) => "MeshInstance".to_string(),
                        NodeKind::Skeleton(s) => format!("Skeleton ({} bones)", s.bone_count()),
                        NodeKind::AnimationPlayer(p) => {
                            format!("AnimationPlayer ({} clips)", p.animation_count())
                        }
                    };
                    println!("  [{}] {} - {}", id, node.name, kind);
                }
            }

            let bounds = scene.bounds();
            if !bounds.is_empty() {
                println!("\n--- Bounds ---");
                println!("  Min: ({:.2}, {:.2}, {:.2})", bounds.x.min, bounds.y.min, bounds.z.min);
                println!("  Max: ({:.2}, {:.2}, {:.2})", bounds.x.max, bounds.y.max, bounds.z.max);
            }

            for dep in &imported.missing_deps {
                println!("Missing: {}", dep.display());
            }
        }
        Err(e) => {
            eprintln!("Error loading file: {}", e);
        }
    }
}
