//! Helpers shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::texture::{ColorSpace, Texture, TextureLoader};

/// Path of a file under the workspace `assets/` directory.
pub fn test_asset_path(relative: &str) -> PathBuf {
    // Get the crate root via CARGO_MANIFEST_DIR or use relative path
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let crate_root = Path::new(&manifest_dir);
    // Go up to workspace root
    let workspace_root = crate_root.parent().unwrap().parent().unwrap();
    workspace_root.join("assets").join(relative)
}

/// Texture loader that "loads" only paths whose file name is in `available`.
#[derive(Default)]
pub struct StubTextures {
    pub available: Vec<String>,
    pub requested: Vec<PathBuf>,
}

impl StubTextures {
    pub fn with(names: &[&str]) -> Self {
        Self {
            available: names.iter().map(|n| n.to_string()).collect(),
            requested: Vec::new(),
        }
    }
}

impl TextureLoader for StubTextures {
    fn load_texture(&mut self, path: &Path, _color_space: ColorSpace) -> Option<Arc<Texture>> {
        self.requested.push(path.to_path_buf());
        let name = path.file_name()?.to_str()?;
        self.available
            .iter()
            .any(|a| a == name)
            .then(|| Arc::new(Texture::new(1, 1, vec![[1.0; 4]], path)))
    }
}
