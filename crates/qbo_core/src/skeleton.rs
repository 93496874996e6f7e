//! Bone hierarchies and the bind-pose skin derived from them.

use qbo_math::Mat4;

/// One bone of a skeleton.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, `None` for roots
    pub parent: Option<usize>,
    /// Rest transform relative to the parent
    pub rest: Mat4,
}

/// An ordered list of named bones.
///
/// Parents may be assigned after creation, but a bone's parent always has a
/// lower index than the bone itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub name: String,
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
        }
    }

    /// Add a root bone with an identity rest transform and return its index.
    pub fn add_bone(&mut self, name: impl Into<String>) -> usize {
        self.bones.push(Bone {
            name: name.into(),
            parent: None,
            rest: Mat4::IDENTITY,
        });
        self.bones.len() - 1
    }

    /// Set the parent of `bone`. Ignored unless `parent` precedes `bone`.
    pub fn set_bone_parent(&mut self, bone: usize, parent: Option<usize>) {
        if parent.map_or(true, |p| p < bone) {
            if let Some(b) = self.bones.get_mut(bone) {
                b.parent = parent;
            }
        }
    }

    pub fn set_bone_rest(&mut self, bone: usize, rest: Mat4) {
        if let Some(b) = self.bones.get_mut(bone) {
            b.rest = rest;
        }
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Rest transform of `bone` in skeleton space.
    pub fn global_rest(&self, bone: usize) -> Mat4 {
        let mut transform = Mat4::IDENTITY;
        let mut current = Some(bone);
        while let Some(index) = current {
            let Some(b) = self.bones.get(index) else {
                break;
            };
            transform = b.rest * transform;
            current = b.parent;
        }
        transform
    }

    /// Build a skin whose bind poses are the inverse global rest transforms.
    pub fn create_skin_from_rest_transforms(&self) -> Skin {
        let binds = self
            .bones
            .iter()
            .enumerate()
            .map(|(index, bone)| SkinBind {
                bone: index,
                name: bone.name.clone(),
                pose: self.global_rest(index).inverse(),
            })
            .collect();
        Skin { binds }
    }
}

/// Binding of one skeleton bone for skinning.
#[derive(Clone, Debug, PartialEq)]
pub struct SkinBind {
    pub bone: usize,
    pub name: String,
    /// Inverse bind matrix
    pub pose: Mat4,
}

/// Maps mesh bone indices to skeleton bones and their bind poses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skin {
    pub binds: Vec<SkinBind>,
}

impl Skin {
    pub fn bind_count(&self) -> usize {
        self.binds.len()
    }
}
