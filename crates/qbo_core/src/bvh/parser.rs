//! Line-driven state machine for BVH-style motion data.
//!
//! Two sub-grammars alternate. The hierarchy grammar builds skeletons from
//! nested `ROOT`/`JOINT`/`End` scopes and records each bone's channel order.
//! The motion grammar, entered at `MOTION`, buffers raw frame lines until
//! `Frames:` of them have been read. A finished clip is decoded into tracks
//! when the next `MOTION` starts or the input ends.

use qbo_math::{Mat4, Vec3};
use thiserror::Error;

use super::decode::decode_clip;
use crate::animation::AnimationLibrary;
use crate::skeleton::Skeleton;
use crate::tokens;

/// Seconds per frame when a clip has no `Frame Time:` line.
pub const DEFAULT_FRAME_TIME: f32 = 0.03333333;

/// Structural errors in motion data.
#[derive(Error, Debug, PartialEq)]
pub enum MotionError {
    #[error("'{0}' outside of a ROOT hierarchy")]
    NoSkeleton(&'static str),

    #[error("'{0}' without a bone in scope")]
    NoBone(&'static str),

    #[error("'{{' without a preceding ROOT, JOINT or End")]
    OpenWithoutBone,

    #[error("'}}' without a matching '{{'")]
    UnmatchedClose,

    #[error("invalid {0} line")]
    TooFewTokens(&'static str),

    #[error("CHANNELS declares {declared} channel(s) but lists {listed}")]
    ChannelCount { declared: i64, listed: usize },

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("frame {frame} has {found} value(s), expected {expected}")]
    FrameTooShort {
        frame: usize,
        found: usize,
        expected: usize,
    },
}

/// One numeric degree of freedom of a bone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    XPosition,
    YPosition,
    ZPosition,
    XRotation,
    YRotation,
    ZRotation,
    WRotation,
}

impl Channel {
    /// Parse a channel tag, ignoring case. `Wrotation` is only accepted when
    /// quaternion channels are enabled.
    pub fn parse(tag: &str, allow_quaternion: bool) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "xposition" => Some(Channel::XPosition),
            "yposition" => Some(Channel::YPosition),
            "zposition" => Some(Channel::ZPosition),
            "xrotation" => Some(Channel::XRotation),
            "yrotation" => Some(Channel::YRotation),
            "zrotation" => Some(Channel::ZRotation),
            "wrotation" if allow_quaternion => Some(Channel::WRotation),
            _ => None,
        }
    }

    pub fn is_position(self) -> bool {
        matches!(
            self,
            Channel::XPosition | Channel::YPosition | Channel::ZPosition
        )
    }
}

/// Declared channel order per bone, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ChannelTable {
    entries: Vec<(usize, Vec<Channel>)>,
}

impl ChannelTable {
    /// Record the channels of `bone`. Returns true if an earlier declaration
    /// for the same bone was replaced.
    pub fn declare(&mut self, bone: usize, channels: Vec<Channel>) -> bool {
        match self.entries.iter_mut().find(|(b, _)| *b == bone) {
            Some(entry) => {
                entry.1 = channels;
                true
            }
            None => {
                self.entries.push((bone, channels));
                false
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Channel])> {
        self.entries.iter().map(|(bone, channels)| (*bone, channels.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of values one frame line must provide.
    pub fn value_count(&self) -> usize {
        self.entries.iter().map(|(_, c)| c.len()).sum()
    }
}

/// Per-dialect behavior of the motion grammar.
#[derive(Clone, Debug)]
pub struct MotionSettings {
    /// Animation library name; also names skeletons when
    /// `name_skeletons_after_library` is set
    pub library_name: String,
    /// Accept `Wrotation` and decode rotations as quaternions
    pub quaternion_channels: bool,
    pub name_skeletons_after_library: bool,
    /// Record each flushed clip as the player's assigned animation
    pub assign_clips: bool,
    pub strip_dead_tracks: bool,
}

/// Everything parsed from one motion file or section.
#[derive(Clone, Debug)]
pub struct MotionLibrary {
    pub skeletons: Vec<Skeleton>,
    pub library: AnimationLibrary,
    /// `<library>/<clip>` of the last flushed clip, if clips are assigned
    pub assigned: Option<String>,
}

/// A bone between its declaration and the `}` closing its scope.
#[derive(Clone, Copy, Debug)]
struct OpenBone {
    bone: usize,
    offset: Vec3,
}

#[derive(Debug)]
struct SkeletonBuild {
    skeleton: Skeleton,
    channels: ChannelTable,
}

impl SkeletonBuild {
    /// `name`, or `name2`, `name3`, ... if the skeleton already has it.
    fn unique_bone_name(&self, name: &str) -> String {
        if self.skeleton.find_bone(name).is_none() {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{}{}", name, n))
            .find(|candidate| self.skeleton.find_bone(candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }
}

/// Raw frames of one `MOTION` block.
#[derive(Clone, Debug)]
pub(crate) struct PendingClip {
    pub name: String,
    /// Skeleton in scope when `MOTION` was read
    pub skeleton: usize,
    pub frame_time: f32,
    pub frame_count: Option<usize>,
    pub frames: Vec<String>,
}

impl PendingClip {
    fn is_complete(&self) -> bool {
        self.frame_count == Some(self.frames.len())
    }
}

/// Incremental motion parser. Feed it trimmed, non-blank, non-comment lines.
pub struct MotionParser {
    settings: MotionSettings,
    skeletons: Vec<SkeletonBuild>,
    current: Option<usize>,
    scopes: Vec<OpenBone>,
    declared: Option<OpenBone>,
    clip: Option<PendingClip>,
    in_motion: bool,
    library: AnimationLibrary,
    assigned: Option<String>,
}

impl MotionParser {
    pub fn new(settings: MotionSettings) -> Self {
        let library = AnimationLibrary::new(settings.library_name.clone());
        Self {
            settings,
            skeletons: Vec::new(),
            current: None,
            scopes: Vec::new(),
            declared: None,
            clip: None,
            in_motion: false,
            library,
            assigned: None,
        }
    }

    /// True while frame lines are being collected.
    pub fn in_motion(&self) -> bool {
        self.in_motion
    }

    /// Process one line.
    pub fn feed(&mut self, line: &str) -> Result<(), MotionError> {
        if self.in_motion {
            self.feed_motion(line);
            return Ok(());
        }

        let tokens = tokens::split(line);
        let Some(&keyword) = tokens.first() else {
            return Ok(());
        };
        let rest = tokens::remainder(line, keyword);

        match keyword {
            "HIERARCHY" => {
                if !rest.is_empty() {
                    self.settings.library_name = rest.to_string();
                    self.library.name = rest.to_string();
                }
            }
            "ROOT" => self.start_skeleton(if rest.is_empty() { "ROOT" } else { rest }),
            "JOINT" => self.declare_bone("JOINT", rest)?,
            "End" => self.declare_bone("End", rest)?,
            "OFFSET" => {
                if tokens.len() < 4 {
                    return Err(MotionError::TooFewTokens("OFFSET"));
                }
                let offset = Vec3::new(
                    tokens::to_float(tokens[1]),
                    tokens::to_float(tokens[2]),
                    tokens::to_float(tokens[3]),
                );
                self.bone_in_scope("OFFSET")?.offset = offset;
            }
            "CHANNELS" => self.declare_channels(&tokens)?,
            "{" => {
                let open = self.declared.take().ok_or(MotionError::OpenWithoutBone)?;
                self.scopes.push(open);
            }
            "}" => self.close_scope()?,
            "MOTION" => self.start_clip(if rest.is_empty() { "MOTION" } else { rest })?,
            _ => log::debug!("Skipping motion line '{}'", line),
        }
        Ok(())
    }

    /// Flush the last clip and hand over the parsed skeletons and clips.
    pub fn finish(mut self) -> Result<MotionLibrary, MotionError> {
        if !self.scopes.is_empty() {
            log::warn!("Motion data ended with {} unclosed scope(s)", self.scopes.len());
        }
        self.flush_clip()?;

        if self.settings.strip_dead_tracks {
            for animation in self.library.animations_mut() {
                let removed = animation.strip_dead_tracks();
                if removed > 0 {
                    log::debug!("Stripped {} dead track(s) from '{}'", removed, animation.name);
                }
            }
        }

        Ok(MotionLibrary {
            skeletons: self.skeletons.into_iter().map(|b| b.skeleton).collect(),
            library: self.library,
            assigned: self.assigned,
        })
    }

    fn feed_motion(&mut self, line: &str) {
        let Some(clip) = self.clip.as_mut() else {
            self.in_motion = false;
            return;
        };

        if line.starts_with("HIERARCHY") {
            self.in_motion = false;
        } else if let Some(value) = line.strip_prefix("Frame Time:") {
            clip.frame_time = tokens::to_float(value.trim());
        } else if let Some(value) = line.strip_prefix("Frames:") {
            clip.frame_count = Some(tokens::to_int(value.trim()).max(0) as usize);
            if clip.is_complete() {
                self.in_motion = false;
            }
        } else {
            clip.frames.push(line.to_string());
            if clip.is_complete() {
                self.in_motion = false;
            }
        }
    }

    fn start_skeleton(&mut self, bone_name: &str) {
        self.scopes.clear();
        self.declared = None;

        let skeleton_name = if self.settings.name_skeletons_after_library {
            self.settings.library_name.as_str()
        } else {
            bone_name
        };
        let mut skeleton = Skeleton::new(skeleton_name);
        let bone = skeleton.add_bone(bone_name);

        self.skeletons.push(SkeletonBuild {
            skeleton,
            channels: ChannelTable::default(),
        });
        self.current = Some(self.skeletons.len() - 1);
        self.declared = Some(OpenBone {
            bone,
            offset: Vec3::ZERO,
        });
    }

    fn declare_bone(&mut self, keyword: &'static str, name: &str) -> Result<(), MotionError> {
        let index = self.current.ok_or(MotionError::NoSkeleton(keyword))?;
        let parent = self.scopes.last().map(|open| open.bone);
        let build = &mut self.skeletons[index];

        let name = build.unique_bone_name(if name.is_empty() { keyword } else { name });
        let bone = build.skeleton.add_bone(name);
        build.skeleton.set_bone_parent(bone, parent);

        self.declared = Some(OpenBone {
            bone,
            offset: Vec3::ZERO,
        });
        Ok(())
    }

    /// The bone an `OFFSET`/`CHANNELS` line applies to: the one declared but
    /// not yet opened, else the innermost open scope.
    fn bone_in_scope(&mut self, keyword: &'static str) -> Result<&mut OpenBone, MotionError> {
        match self.declared.as_mut() {
            Some(open) => Ok(open),
            None => self.scopes.last_mut().ok_or(MotionError::NoBone(keyword)),
        }
    }

    fn declare_channels(&mut self, tokens: &[&str]) -> Result<(), MotionError> {
        if tokens.len() < 2 {
            return Err(MotionError::TooFewTokens("CHANNELS"));
        }
        let declared = tokens::to_int(tokens[1]);
        let listed = tokens.len() - 2;
        if declared < 1 || declared as usize != listed {
            return Err(MotionError::ChannelCount { declared, listed });
        }

        let allow_quaternion = self.settings.quaternion_channels;
        let channels = tokens[2..]
            .iter()
            .map(|tag| {
                Channel::parse(tag, allow_quaternion)
                    .ok_or_else(|| MotionError::UnknownChannel(tag.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bone = self.bone_in_scope("CHANNELS")?.bone;
        let index = self.current.ok_or(MotionError::NoSkeleton("CHANNELS"))?;
        let build = &mut self.skeletons[index];
        if build.channels.declare(bone, channels) {
            log::warn!(
                "Bone '{}' declares CHANNELS twice, keeping the last",
                build.skeleton.bone(bone).map_or("", |b| b.name.as_str())
            );
        }
        Ok(())
    }

    fn close_scope(&mut self) -> Result<(), MotionError> {
        let open = self.scopes.pop().ok_or(MotionError::UnmatchedClose)?;
        if let Some(build) = self.current.and_then(|i| self.skeletons.get_mut(i)) {
            build
                .skeleton
                .set_bone_rest(open.bone, Mat4::from_translation(open.offset));
        }
        Ok(())
    }

    fn start_clip(&mut self, name: &str) -> Result<(), MotionError> {
        let skeleton = self.current.ok_or(MotionError::NoSkeleton("MOTION"))?;
        if !self.scopes.is_empty() {
            log::warn!("MOTION with {} unclosed scope(s)", self.scopes.len());
            self.scopes.clear();
        }
        self.declared = None;

        self.flush_clip()?;
        self.clip = Some(PendingClip {
            name: name.to_string(),
            skeleton,
            frame_time: DEFAULT_FRAME_TIME,
            frame_count: None,
            frames: Vec::new(),
        });
        self.in_motion = true;
        Ok(())
    }

    /// Decode the pending clip into the library if all its frames were read.
    fn flush_clip(&mut self) -> Result<(), MotionError> {
        let Some(clip) = self.clip.take() else {
            return Ok(());
        };
        if !clip.is_complete() {
            log::warn!(
                "Dropping clip '{}': read {} frame(s), expected {:?}",
                clip.name,
                clip.frames.len(),
                clip.frame_count
            );
            return Ok(());
        }

        let build = &self.skeletons[clip.skeleton];
        let animation = decode_clip(&clip, &build.skeleton, &build.channels)?;
        log::debug!(
            "Decoded clip '{}' ({} frames, {} tracks)",
            animation.name,
            clip.frames.len(),
            animation.track_count()
        );

        if self.settings.assign_clips {
            self.assigned = Some(format!("{}/{}", self.settings.library_name, animation.name));
        }
        self.library.add_animation(animation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TrackKind;

    fn settings() -> MotionSettings {
        MotionSettings {
            library_name: "walk".to_string(),
            quaternion_channels: false,
            name_skeletons_after_library: false,
            assign_clips: false,
            strip_dead_tracks: false,
        }
    }

    fn parse_with(settings: MotionSettings, text: &str) -> Result<MotionLibrary, MotionError> {
        let mut parser = MotionParser::new(settings);
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            parser.feed(line)?;
        }
        parser.finish()
    }

    fn parse(text: &str) -> Result<MotionLibrary, MotionError> {
        parse_with(settings(), text)
    }

    const HIPS: &str = "
        HIERARCHY
        ROOT Hips
        {
            OFFSET 0 0 0
            CHANNELS 3 Xposition Yposition Zposition
        }
        MOTION
        Frames: 1
        Frame Time: 0.1
        1.0 2.0 3.0
    ";

    #[test]
    fn test_single_position_key() {
        let motion = parse(HIPS).unwrap();
        let animation = motion.library.animation("MOTION").unwrap();

        let track = animation.find_track("Hips:Hips", TrackKind::Position).unwrap();
        let keys = track.position_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].time, 0.0);
        assert_eq!(keys[0].value, Vec3::new(1.0, 2.0, 3.0));
        assert!((animation.step - 0.1).abs() < 0.0001);
    }

    #[test]
    fn test_rotation_only_track_is_dead_without_rotation_channels() {
        let motion = parse(HIPS).unwrap();
        let animation = motion.library.animation("MOTION").unwrap();
        // Rotation track was allocated but never bound
        assert_eq!(animation.track_count(), 2);

        let mut stripping = settings();
        stripping.strip_dead_tracks = true;
        let motion = parse_with(stripping, HIPS).unwrap();
        assert_eq!(motion.library.animation("MOTION").unwrap().track_count(), 1);
    }

    #[test]
    fn test_hierarchy_builds_parented_bones() {
        let text = "
            HIERARCHY
            ROOT Hips
            {
                OFFSET 0 1 0
                CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
                JOINT Spine
                {
                    OFFSET 0 2 0
                    CHANNELS 3 Zrotation Xrotation Yrotation
                    End Site
                    {
                        OFFSET 0 3 0
                    }
                }
                JOINT Leg
                {
                    OFFSET 1 0 0
                    CHANNELS 3 Zrotation Xrotation Yrotation
                    End Site
                    {
                        OFFSET 0 -1 0
                    }
                }
            }
        ";
        let motion = parse(text).unwrap();
        assert_eq!(motion.skeletons.len(), 1);

        let skeleton = &motion.skeletons[0];
        assert_eq!(skeleton.name, "Hips");
        let names: Vec<&str> = skeleton.bones().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Hips", "Spine", "Site", "Leg", "Site2"]);

        let site = skeleton.find_bone("Site").unwrap();
        assert_eq!(skeleton.bone(site).unwrap().parent, skeleton.find_bone("Spine"));
        let leg = skeleton.find_bone("Leg").unwrap();
        assert_eq!(skeleton.bone(leg).unwrap().parent, Some(0));

        let global = skeleton.global_rest(site);
        assert!((global.w_axis.truncate() - Vec3::new(0.0, 6.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_unmatched_close_is_error() {
        let err = parse("ROOT Hips\n{\n}\n}\n").unwrap_err();
        assert_eq!(err, MotionError::UnmatchedClose);
    }

    #[test]
    fn test_open_without_bone_is_error() {
        assert_eq!(parse("{\n").unwrap_err(), MotionError::OpenWithoutBone);
    }

    #[test]
    fn test_channel_errors() {
        let err = parse("ROOT Hips\n{\nCHANNELS 2 Xposition Scale\n").unwrap_err();
        assert_eq!(err, MotionError::UnknownChannel("Scale".to_string()));

        let err = parse("ROOT Hips\n{\nCHANNELS 3 Xposition Yposition\n").unwrap_err();
        assert_eq!(err, MotionError::ChannelCount { declared: 3, listed: 2 });

        let err = parse("ROOT Hips\n{\nCHANNELS 0\n").unwrap_err();
        assert!(matches!(err, MotionError::ChannelCount { declared: 0, .. }));

        let err = parse("ROOT Hips\n{\nOFFSET 1 2\n").unwrap_err();
        assert_eq!(err, MotionError::TooFewTokens("OFFSET"));
    }

    #[test]
    fn test_w_rotation_requires_quaternion_channels() {
        let text = "ROOT Hips\n{\nCHANNELS 4 Xrotation Yrotation Zrotation Wrotation\n}\n";
        assert!(matches!(parse(text), Err(MotionError::UnknownChannel(_))));

        let mut quaternion = settings();
        quaternion.quaternion_channels = true;
        assert!(parse_with(quaternion, text).is_ok());
    }

    #[test]
    fn test_channel_tags_ignore_case() {
        assert_eq!(Channel::parse("XPOSITION", false), Some(Channel::XPosition));
        assert_eq!(Channel::parse("zRotation", false), Some(Channel::ZRotation));
        assert!(Channel::XPosition.is_position());
        assert!(!Channel::WRotation.is_position());
    }

    #[test]
    fn test_incomplete_clip_is_dropped() {
        let text = "ROOT Hips\n{\nCHANNELS 1 Xposition\n}\nMOTION\nFrames: 3\n1\n2\n";
        let motion = parse(text).unwrap();
        assert!(motion.library.is_empty());
    }

    #[test]
    fn test_zero_frames_completes_immediately() {
        let text = "ROOT Hips\n{\nCHANNELS 1 Xposition\n}\nMOTION idle\nFrames: 0\n";
        let motion = parse(text).unwrap();
        let animation = motion.library.animation("idle").unwrap();
        assert!(animation.tracks().iter().all(|t| t.key_count() == 0));
    }

    #[test]
    fn test_multiple_clips_bind_to_their_skeleton() {
        let text = "
            HIERARCHY
            ROOT A
            {
                CHANNELS 1 Xposition
            }
            MOTION first
            Frames: 1
            5
            HIERARCHY
            ROOT B
            {
                CHANNELS 2 Yposition Zposition
            }
            MOTION second
            Frames: 1
            6 7
        ";
        let motion = parse(text).unwrap();
        assert_eq!(motion.skeletons.len(), 2);

        let first = motion.library.animation("first").unwrap();
        let key = first.find_track("A:A", TrackKind::Position).unwrap().position_keys()[0];
        assert_eq!(key.value, Vec3::new(5.0, 0.0, 0.0));

        let second = motion.library.animation("second").unwrap();
        let key = second.find_track("B:B", TrackKind::Position).unwrap().position_keys()[0];
        assert_eq!(key.value, Vec3::new(0.0, 6.0, 7.0));
    }

    #[test]
    fn test_library_naming_and_assignment() {
        let mut qbo = settings();
        qbo.name_skeletons_after_library = true;
        qbo.assign_clips = true;

        let text = "HIERARCHY rig\nROOT Hips\n{\nCHANNELS 1 Xposition\n}\nMOTION\nFrames: 1\n0\n";
        let motion = parse_with(qbo, text).unwrap();

        assert_eq!(motion.skeletons[0].name, "rig");
        assert_eq!(motion.library.name, "rig");
        assert_eq!(motion.assigned.as_deref(), Some("rig/MOTION"));
    }

    #[test]
    fn test_short_frame_is_error() {
        let text = "ROOT Hips\n{\nCHANNELS 3 Xposition Yposition Zposition\n}\nMOTION\nFrames: 1\n1 2\n";
        assert!(matches!(
            parse(text),
            Err(MotionError::FrameTooShort { frame: 0, found: 2, expected: 3 })
        ));
    }
}
