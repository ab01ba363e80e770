//! Keyframe animation of model node poses.
//!
//! An [`AnimationMixer`] owns one looping action per clip and advances them by
//! the frame delta, writing sampled translations, rotations and scales into a
//! pose of per-node [`Transform`]s.

use glam::{Quat, Vec3};

use crate::mesh::Transform;

/// How values between two keyframes are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the earlier key until the next one.
    Step,
    #[default]
    Linear,
}

/// Keyframe values of one channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Translation(v) | Self::Scale(v) => v.len(),
            Self::Rotation(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyframes driving one property of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub node: usize,
    pub interpolation: Interpolation,
    /// Ascending key times in seconds.
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl Channel {
    /// Key index and blend factor for time `t`, clamped to the key range.
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        let last = count - 1;
        if t <= self.times[0] || count == 1 {
            return Some((0, 0, 0.0));
        }
        if t >= self.times[last] {
            return Some((last, last, 0.0));
        }
        // First key strictly after t; t lies in [times[i - 1], times[i])
        let i = self.times[..count].partition_point(|&k| k <= t);
        let (t0, t1) = (self.times[i - 1], self.times[i]);
        let f = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear if t1 > t0 => (t - t0) / (t1 - t0),
            Interpolation::Linear => 0.0,
        };
        Some((i - 1, i, f))
    }

    /// Write this channel's value at time `t` into `pose`.
    pub fn apply(&self, t: f32, pose: &mut [Transform]) {
        let Some(target) = pose.get_mut(self.node) else {
            return;
        };
        let Some((a, b, f)) = self.locate(t) else {
            return;
        };
        match &self.values {
            ChannelValues::Translation(v) => target.position = v[a].lerp(v[b], f),
            ChannelValues::Rotation(v) => target.rotation = v[a].slerp(v[b], f).normalize(),
            ChannelValues::Scale(v) => target.scale = v[a].lerp(v[b], f),
        }
    }
}

/// A named set of channels.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Time of the latest key across all channels.
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    pub fn apply(&self, t: f32, pose: &mut [Transform]) {
        for channel in &self.channels {
            channel.apply(t, pose);
        }
    }
}

/// Playback state of one clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationAction {
    pub clip: usize,
    /// Local time in seconds, inside `[0, duration)` while looping.
    pub time: f32,
    pub looping: bool,
    pub playing: bool,
}

/// Plays every clip of a model at once.
#[derive(Clone, Debug)]
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<AnimationAction>,
    time: f32,
}

impl AnimationMixer {
    /// Create a mixer with one looping, playing action per clip.
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        let actions = (0..clips.len())
            .map(|clip| AnimationAction {
                clip,
                time: 0.0,
                looping: true,
                playing: true,
            })
            .collect();
        Self {
            clips,
            actions,
            time: 0.0,
        }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [AnimationAction] {
        &mut self.actions
    }

    /// Total time the mixer has been advanced by.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advance every playing action by `delta` seconds and write the result into `pose`.
    pub fn update(&mut self, delta: f32, pose: &mut [Transform]) {
        self.time += delta;
        for action in &mut self.actions {
            let Some(clip) = self.clips.get(action.clip) else {
                continue;
            };
            if action.playing {
                action.time += delta;
                if clip.duration > 0.0 {
                    if action.looping {
                        action.time = action.time.rem_euclid(clip.duration);
                    } else if action.time >= clip.duration {
                        action.time = clip.duration;
                        action.playing = false;
                    }
                }
            }
            clip.apply(action.time, pose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide_x(duration: f32) -> AnimationClip {
        AnimationClip::new(
            "slide",
            vec![Channel {
                node: 0,
                interpolation: Interpolation::Linear,
                times: vec![0.0, duration],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(duration, 0.0, 0.0)]),
            }],
        )
    }

    #[test]
    fn duration_is_latest_key() {
        assert_eq!(slide_x(2.5).duration, 2.5);
        assert_eq!(AnimationClip::new("empty", Vec::new()).duration, 0.0);
    }

    #[test]
    fn mixer_advances_by_delta() {
        let mut mixer = AnimationMixer::new(vec![slide_x(4.0)]);
        let mut pose = vec![Transform::default()];
        mixer.update(0.5, &mut pose);
        mixer.update(0.5, &mut pose);
        assert!((mixer.actions()[0].time - 1.0).abs() < 1e-6);
        assert!((pose[0].position.x - 1.0).abs() < 1e-5);
        assert!((mixer.time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn looping_wraps_time() {
        let mut mixer = AnimationMixer::new(vec![slide_x(1.0)]);
        let mut pose = vec![Transform::default()];
        mixer.update(1.25, &mut pose);
        assert!((mixer.actions()[0].time - 0.25).abs() < 1e-5);
        assert!((pose[0].position.x - 0.25).abs() < 1e-5);
    }

    #[test]
    fn step_holds_previous_key() {
        let channel = Channel {
            node: 0,
            interpolation: Interpolation::Step,
            times: vec![0.0, 1.0, 2.0],
            values: ChannelValues::Scale(vec![Vec3::ONE, Vec3::splat(2.0), Vec3::splat(3.0)]),
        };
        let mut pose = vec![Transform::default()];
        channel.apply(1.9, &mut pose);
        assert_eq!(pose[0].scale, Vec3::splat(2.0));
        channel.apply(5.0, &mut pose);
        assert_eq!(pose[0].scale, Vec3::splat(3.0));
    }

    #[test]
    fn rotation_slerps_between_keys() {
        let end = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let channel = Channel {
            node: 1,
            interpolation: Interpolation::Linear,
            times: vec![0.0, 1.0],
            values: ChannelValues::Rotation(vec![Quat::IDENTITY, end]),
        };
        let mut pose = vec![Transform::default(); 2];
        channel.apply(0.5, &mut pose);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(pose[1].rotation.dot(expected).abs() > 1.0 - 1e-5);
        assert_eq!(pose[0], Transform::default());
    }

    #[test]
    fn channels_for_missing_nodes_are_ignored() {
        let mut clip = slide_x(1.0);
        clip.channels[0].node = 7;
        let mut pose = vec![Transform::default()];
        clip.apply(0.5, &mut pose);
        assert_eq!(pose[0], Transform::default());
    }
}
