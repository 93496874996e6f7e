//! Keyframed transform tracks grouped into clips, libraries and a player.

use qbo_math::{Quat, Vec3};

/// What a track animates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Position,
    Rotation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionKey {
    pub time: f32,
    pub value: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationKey {
    pub time: f32,
    pub value: Quat,
}

/// Keys of one track, typed by [`TrackKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum TrackKeys {
    Position(Vec<PositionKey>),
    Rotation(Vec<RotationKey>),
}

/// One animated property of one bone.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// `<skeleton>:<bone>`, or `None` if the track was never bound
    pub path: Option<String>,
    pub keys: TrackKeys,
}

impl Track {
    pub fn new(kind: TrackKind) -> Self {
        let keys = match kind {
            TrackKind::Position => TrackKeys::Position(Vec::new()),
            TrackKind::Rotation => TrackKeys::Rotation(Vec::new()),
        };
        Self { path: None, keys }
    }

    pub fn kind(&self) -> TrackKind {
        match self.keys {
            TrackKeys::Position(_) => TrackKind::Position,
            TrackKeys::Rotation(_) => TrackKind::Rotation,
        }
    }

    pub fn key_count(&self) -> usize {
        match &self.keys {
            TrackKeys::Position(keys) => keys.len(),
            TrackKeys::Rotation(keys) => keys.len(),
        }
    }

    pub fn position_keys(&self) -> &[PositionKey] {
        match &self.keys {
            TrackKeys::Position(keys) => keys,
            TrackKeys::Rotation(_) => &[],
        }
    }

    pub fn rotation_keys(&self) -> &[RotationKey] {
        match &self.keys {
            TrackKeys::Rotation(keys) => keys,
            TrackKeys::Position(_) => &[],
        }
    }
}

/// A named clip.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub name: String,
    /// Seconds between frames
    pub step: f32,
    /// Clip duration in seconds
    pub length: f32,
    tracks: Vec<Track>,
}

impl Animation {
    pub fn new(name: impl Into<String>, step: f32) -> Self {
        Self {
            name: name.into(),
            step,
            length: 0.0,
            tracks: Vec::new(),
        }
    }

    /// Append an empty, unbound track and return its index.
    pub fn add_track(&mut self, kind: TrackKind) -> usize {
        self.tracks.push(Track::new(kind));
        self.tracks.len() - 1
    }

    pub fn track_set_path(&mut self, track: usize, path: impl Into<String>) {
        if let Some(t) = self.tracks.get_mut(track) {
            t.path = Some(path.into());
        }
    }

    /// Insert a position key. Ignored on rotation tracks.
    pub fn position_track_insert_key(&mut self, track: usize, time: f32, value: Vec3) {
        if let Some(Track {
            keys: TrackKeys::Position(keys),
            ..
        }) = self.tracks.get_mut(track)
        {
            keys.push(PositionKey { time, value });
        }
    }

    /// Insert a rotation key. Ignored on position tracks.
    pub fn rotation_track_insert_key(&mut self, track: usize, time: f32, value: Quat) {
        if let Some(Track {
            keys: TrackKeys::Rotation(keys),
            ..
        }) = self.tracks.get_mut(track)
        {
            keys.push(RotationKey { time, value });
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Find the track of `kind` bound to `path`.
    pub fn find_track(&self, path: &str, kind: TrackKind) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.kind() == kind && t.path.as_deref() == Some(path))
    }

    /// Remove tracks that were never bound to a path. Returns how many were removed.
    pub fn strip_dead_tracks(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.path.is_some());
        before - self.tracks.len()
    }
}

/// Named set of clips, one per motion file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationLibrary {
    pub name: String,
    animations: Vec<Animation>,
}

impl AnimationLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            animations: Vec::new(),
        }
    }

    /// Add a clip, replacing any clip with the same name.
    pub fn add_animation(&mut self, animation: Animation) {
        match self.animations.iter_mut().find(|a| a.name == animation.name) {
            Some(existing) => *existing = animation,
            None => self.animations.push(animation),
        }
    }

    /// Move every clip of `other` into this library.
    pub fn merge(&mut self, other: AnimationLibrary) {
        for animation in other.animations {
            self.add_animation(animation);
        }
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn animations_mut(&mut self) -> impl Iterator<Item = &mut Animation> {
        self.animations.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

/// Owner of the animation libraries attached to an imported scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationPlayer {
    libraries: Vec<AnimationLibrary>,
    /// `<library>/<clip>` to play by default
    pub assigned: Option<String>,
}

impl AnimationPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the library called `name`, creating it if needed.
    pub fn library_mut(&mut self, name: &str) -> &mut AnimationLibrary {
        let index = match self.libraries.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                self.libraries.push(AnimationLibrary::new(name));
                self.libraries.len() - 1
            }
        };
        &mut self.libraries[index]
    }

    pub fn library(&self, name: &str) -> Option<&AnimationLibrary> {
        self.libraries.iter().find(|l| l.name == name)
    }

    pub fn libraries(&self) -> &[AnimationLibrary] {
        &self.libraries
    }

    /// Look up a clip by `<library>/<clip>`.
    pub fn animation(&self, qualified_name: &str) -> Option<&Animation> {
        let (library, clip) = qualified_name.split_once('/')?;
        self.library(library)?.animation(clip)
    }

    pub fn animation_count(&self) -> usize {
        self.libraries.iter().map(AnimationLibrary::len).sum()
    }
}
