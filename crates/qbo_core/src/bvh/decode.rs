//! Frame-line decoding into position and rotation tracks.

use qbo_math::{is_zero_approx, Quat, Vec3};

use super::parser::{Channel, ChannelTable, MotionError, PendingClip};
use crate::animation::{Animation, TrackKind};
use crate::skeleton::Skeleton;
use crate::tokens;

/// Per-bone track pair, bound to a path on first key.
struct BoneTracks<'a> {
    bone: usize,
    channels: &'a [Channel],
    position: usize,
    rotation: usize,
}

/// Turn the buffered frame lines of `clip` into an [`Animation`].
///
/// Every bone with declared channels gets one position and one rotation
/// track. A track only receives keys (and its `<skeleton>:<bone>` path) when
/// the bone declares channels of that kind, so the other one stays unbound.
pub(crate) fn decode_clip(
    clip: &PendingClip,
    skeleton: &Skeleton,
    channels: &ChannelTable,
) -> Result<Animation, MotionError> {
    let mut animation = Animation::new(clip.name.clone(), clip.frame_time);
    animation.length = clip.frames.len() as f32 * clip.frame_time;

    let bones: Vec<BoneTracks> = channels
        .iter()
        .map(|(bone, channels)| BoneTracks {
            bone,
            channels,
            position: animation.add_track(TrackKind::Position),
            rotation: animation.add_track(TrackKind::Rotation),
        })
        .collect();

    let expected = channels.value_count();
    for (frame, line) in clip.frames.iter().enumerate() {
        let values: Vec<f32> = tokens::split(line).into_iter().map(tokens::to_float).collect();
        if values.len() < expected {
            return Err(MotionError::FrameTooShort {
                frame,
                found: values.len(),
                expected,
            });
        }

        let time = frame as f32 * clip.frame_time;
        let mut cursor = 0;
        for tracks in &bones {
            let slice = &values[cursor..cursor + tracks.channels.len()];
            cursor += tracks.channels.len();

            let path = skeleton
                .bone(tracks.bone)
                .map(|b| format!("{}:{}", skeleton.name, b.name))
                .unwrap_or_default();

            if let Some(position) = decode_position(tracks.channels, slice) {
                if frame == 0 {
                    animation.track_set_path(tracks.position, path.clone());
                }
                animation.position_track_insert_key(tracks.position, time, position);
            }
            if let Some(rotation) = decode_rotation(tracks.channels, slice) {
                if frame == 0 {
                    animation.track_set_path(tracks.rotation, path);
                }
                animation.rotation_track_insert_key(tracks.rotation, time, rotation);
            }
        }
    }

    Ok(animation)
}

/// Position from the X/Y/Z position channels; undeclared axes are zero.
fn decode_position(channels: &[Channel], values: &[f32]) -> Option<Vec3> {
    let mut position = Vec3::ZERO;
    let mut any = false;
    for (&channel, &value) in channels.iter().zip(values) {
        match channel {
            Channel::XPosition => position.x = value,
            Channel::YPosition => position.y = value,
            Channel::ZPosition => position.z = value,
            _ => continue,
        }
        any = true;
    }
    any.then_some(position)
}

/// Rotation from the rotation channels.
///
/// With a `Wrotation` channel the four values form a quaternion directly.
/// Otherwise each value is an Euler angle in radians, composed in the order
/// the channels were declared.
fn decode_rotation(channels: &[Channel], values: &[f32]) -> Option<Quat> {
    if channels.contains(&Channel::WRotation) {
        let mut xyzw = [0.0, 0.0, 0.0, 1.0];
        for (&channel, &value) in channels.iter().zip(values) {
            match channel {
                Channel::XRotation => xyzw[0] = value,
                Channel::YRotation => xyzw[1] = value,
                Channel::ZRotation => xyzw[2] = value,
                Channel::WRotation => xyzw[3] = value,
                _ => {}
            }
        }
        let q = Quat::from_array(xyzw);
        return Some(if !is_zero_approx(q.length_squared()) {
            q.normalize()
        } else {
            Quat::IDENTITY
        });
    }

    let mut rotation = Quat::IDENTITY;
    let mut any = false;
    for (&channel, &value) in channels.iter().zip(values) {
        let axis = match channel {
            Channel::XRotation => Vec3::X,
            Channel::YRotation => Vec3::Y,
            Channel::ZRotation => Vec3::Z,
            _ => continue,
        };
        rotation *= Quat::from_axis_angle(axis, value);
        any = true;
    }
    any.then_some(rotation)
}
