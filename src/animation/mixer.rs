use nalgebra_glm as glm;

use crate::animation::clip::{Clip, Sampled, Transform};
use crate::error::ViewerError;

/// Crossfade length in mixer time units when switching clips.
pub const CROSSFADE_SECS: f32 = 0.5;
/// Upper bound for the playback speed multiplier.
pub const MAX_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
enum Fade {
    Hold,
    In { from: f32, remaining: f32 },
    Out { from: f32, remaining: f32 },
}

#[derive(Debug, Clone)]
struct Action {
    clip: usize,
    time: f32,
    weight: f32,
    fade: Fade,
}

/// Drives one model's animation clips: looping playback, clip switching
/// with an overlapping crossfade, and a clamped speed multiplier.
pub struct Mixer {
    clips: Vec<Clip>,
    actions: Vec<Action>,
    active: Option<usize>,
    speed: f32,
    time: f32,
}

impl Mixer {
    /// Clip 0 starts playing immediately at full weight; the crossfade only
    /// applies to later switches.
    pub fn new(clips: Vec<Clip>) -> Self {
        let mut mixer = Self {
            clips,
            actions: Vec::new(),
            active: None,
            speed: 1.0,
            time: 0.0,
        };
        if !mixer.clips.is_empty() {
            mixer.actions.push(Action {
                clip: 0,
                time: 0.0,
                weight: 1.0,
                fade: Fade::Hold,
            });
            mixer.active = Some(0);
        }
        mixer
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    #[allow(dead_code)]
    pub fn active_clip(&self) -> Option<usize> {
        self.active
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Total mixer time accumulated so far (sum of dt * speed).
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_speed(&mut self, value: f32) {
        self.speed = value.clamp(0.0, MAX_SPEED);
    }

    /// Switch to clip `index`: the current action fades out over
    /// [`CROSSFADE_SECS`] while the new one resets and fades in over the
    /// same window. An out-of-range index is rejected.
    pub fn activate(&mut self, index: usize) -> Result<(), ViewerError> {
        if index >= self.clips.len() {
            return Err(ViewerError::ClipIndex {
                index,
                count: self.clips.len(),
            });
        }
        for action in &mut self.actions {
            action.fade = Fade::Out {
                from: action.weight,
                remaining: CROSSFADE_SECS,
            };
        }
        self.actions.push(Action {
            clip: index,
            time: 0.0,
            weight: 0.0,
            fade: Fade::In {
                from: 0.0,
                remaining: CROSSFADE_SECS,
            },
        });
        self.active = Some(index);
        Ok(())
    }

    /// Progress every live action (and its fade) by `dt * speed`. Clip time
    /// wraps at the clip duration; actions that finished fading out drop off.
    pub fn advance(&mut self, dt: f32) {
        let step = dt.max(0.0) * self.speed;
        self.time += step;

        for action in &mut self.actions {
            action.time += step;
            let duration = self.clips[action.clip].duration;
            if duration > 0.0 {
                action.time %= duration;
            }
            action.fade = match action.fade {
                Fade::Hold => {
                    action.weight = 1.0;
                    Fade::Hold
                }
                Fade::In { from, remaining } => {
                    let remaining = remaining - step;
                    if remaining <= 0.0 {
                        action.weight = 1.0;
                        Fade::Hold
                    } else {
                        action.weight = from + (1.0 - from) * (1.0 - remaining / CROSSFADE_SECS);
                        Fade::In { from, remaining }
                    }
                }
                Fade::Out { from, remaining } => {
                    let remaining = remaining - step;
                    action.weight = from * (remaining / CROSSFADE_SECS).max(0.0);
                    Fade::Out { from, remaining }
                }
            };
        }

        self.actions
            .retain(|a| !matches!(a.fade, Fade::Out { remaining, .. } if remaining <= 0.0));
    }

    /// Blend all live actions over the model's base pose and return the
    /// per-node local transforms for this frame.
    pub fn pose(&self, base: &[Transform]) -> Vec<Transform> {
        let mut out: Vec<Transform> = base.to_vec();
        let total: f32 = self.actions.iter().map(|a| a.weight).sum();
        if total <= 0.0 {
            return out;
        }

        let n = base.len();
        let mut t_acc = vec![glm::vec3(0.0, 0.0, 0.0); n];
        let mut t_w = vec![0.0_f32; n];
        let mut r_acc = vec![glm::quat(0.0, 0.0, 0.0, 0.0); n];
        let mut r_w = vec![0.0_f32; n];
        let mut s_acc = vec![glm::vec3(0.0, 0.0, 0.0); n];
        let mut s_w = vec![0.0_f32; n];

        for action in &self.actions {
            let w = action.weight / total;
            if w <= 0.0 {
                continue;
            }
            let clip = &self.clips[action.clip];
            for channel in &clip.channels {
                let node = channel.node;
                if node >= n {
                    continue;
                }
                match channel.sample(action.time) {
                    Sampled::Translation(v) => {
                        t_acc[node] += v * w;
                        t_w[node] += w;
                    }
                    Sampled::Rotation(q) => {
                        // Keep quaternions in the same hemisphere before summing.
                        let q = if r_w[node] > 0.0 && r_acc[node].dot(&q) < 0.0 {
                            -q
                        } else {
                            q
                        };
                        r_acc[node].coords += q.coords * w;
                        r_w[node] += w;
                    }
                    Sampled::Scale(v) => {
                        s_acc[node] += v * w;
                        s_w[node] += w;
                    }
                }
            }
        }

        for i in 0..n {
            if t_w[i] > 0.0 {
                out[i].translation = t_acc[i] + base[i].translation * (1.0 - t_w[i]);
            }
            if s_w[i] > 0.0 {
                out[i].scale = s_acc[i] + base[i].scale * (1.0 - s_w[i]);
            }
            if r_w[i] > 0.0 {
                let mut q = r_acc[i];
                let base_q = if r_acc[i].dot(&base[i].rotation) < 0.0 {
                    -base[i].rotation
                } else {
                    base[i].rotation
                };
                q.coords += base_q.coords * (1.0 - r_w[i]);
                out[i].rotation = glm::quat_normalize(&q);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{Channel, Interpolation, Keyframes};

    fn clip(name: &str, node: usize, length: f32) -> Clip {
        Clip::new(
            name.into(),
            vec![Channel {
                node,
                times: vec![0.0, length],
                values: Keyframes::Translation(vec![
                    glm::vec3(0.0, 0.0, 0.0),
                    glm::vec3(1.0, 0.0, 0.0),
                ]),
                interpolation: Interpolation::Linear,
            }],
        )
    }

    fn mixer_with(count: usize) -> Mixer {
        Mixer::new((0..count).map(|i| clip(&format!("clip {i}"), 0, 2.0)).collect())
    }

    #[test]
    fn first_clip_plays_immediately_without_fade() {
        let mixer = mixer_with(2);
        assert_eq!(mixer.active_clip(), Some(0));
        assert_eq!(mixer.actions.len(), 1);
        assert_eq!(mixer.actions[0].weight, 1.0);
    }

    #[test]
    fn empty_clip_list_means_no_active_clip() {
        let mixer = Mixer::new(Vec::new());
        assert_eq!(mixer.active_clip(), None);
        assert!(mixer.actions.is_empty());
    }

    #[test]
    fn activate_out_of_range_is_rejected() {
        let mut mixer = mixer_with(2);
        assert!(matches!(
            mixer.activate(2),
            Err(ViewerError::ClipIndex { index: 2, count: 2 })
        ));
        // the rejected call left the mixer untouched
        assert_eq!(mixer.active_clip(), Some(0));
        assert_eq!(mixer.actions.len(), 1);
    }

    #[test]
    fn activate_crossfades_over_half_a_second() {
        let mut mixer = mixer_with(2);
        mixer.activate(1).unwrap();
        assert_eq!(mixer.active_clip(), Some(1));
        assert_eq!(mixer.actions.len(), 2);

        mixer.advance(0.25);
        assert!((mixer.actions[0].weight - 0.5).abs() < 1e-5);
        assert!((mixer.actions[1].weight - 0.5).abs() < 1e-5);

        mixer.advance(0.3);
        // old action finished its fade-out and was dropped
        assert_eq!(mixer.actions.len(), 1);
        assert_eq!(mixer.actions[0].clip, 1);
        assert_eq!(mixer.actions[0].weight, 1.0);
    }

    #[test]
    fn switching_never_leaves_zero_active_actions() {
        let mut mixer = mixer_with(3);
        for i in [1, 2, 0, 2, 1] {
            mixer.activate(i).unwrap();
            mixer.advance(0.1);
            assert!(!mixer.actions.is_empty());
            assert_eq!(mixer.active_clip(), Some(i));
        }
    }

    #[test]
    fn reactivating_the_active_clip_restarts_it() {
        let mut mixer = mixer_with(2);
        mixer.advance(1.3);
        mixer.activate(0).unwrap();
        // the old run fades out while a fresh one starts at t=0
        assert_eq!(mixer.active_clip(), Some(0));
        assert_eq!(mixer.actions.len(), 2);
        assert!((mixer.actions[0].time - 1.3).abs() < 1e-5);
        assert_eq!(mixer.actions[1].time, 0.0);
        mixer.advance(0.6);
        assert_eq!(mixer.actions.len(), 1);
        assert!((mixer.actions[0].time - 0.6).abs() < 1e-5);
    }

    #[test]
    fn interrupted_fade_continues_from_current_weight() {
        let mut mixer = mixer_with(3);
        mixer.activate(1).unwrap();
        mixer.advance(0.25); // clip 1 at weight 0.5
        mixer.activate(2).unwrap();
        mixer.advance(0.0);
        // the half-faded action starts its fade-out from 0.5, not 1.0
        let out = mixer.actions.iter().find(|a| a.clip == 1).unwrap();
        assert!(out.weight <= 0.5 + 1e-5);
    }

    #[test]
    fn mixer_time_accumulates_dt_times_speed() {
        let mut mixer = mixer_with(1);
        mixer.set_speed(0.5);
        for _ in 0..10 {
            mixer.advance(0.2);
        }
        assert!((mixer.time() - 1.0).abs() < 1e-5);

        mixer.set_speed(2.0);
        mixer.advance(0.25);
        assert!((mixer.time() - 1.5).abs() < 1e-5);
    }

    #[test]
    fn negative_delta_is_ignored() {
        let mut mixer = mixer_with(1);
        mixer.advance(-1.0);
        assert_eq!(mixer.time(), 0.0);
    }

    #[test]
    fn speed_is_clamped_to_bounds() {
        let mut mixer = mixer_with(1);
        mixer.set_speed(9.0);
        assert_eq!(mixer.speed(), MAX_SPEED);
        mixer.set_speed(-1.0);
        assert_eq!(mixer.speed(), 0.0);
    }

    #[test]
    fn clip_time_wraps_at_duration() {
        let mut mixer = mixer_with(1);
        mixer.advance(2.5);
        assert!((mixer.actions[0].time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn pose_blends_actions_by_weight() {
        let base = vec![Transform::identity()];
        let slow = clip("a", 0, 2.0);
        // clip "b" holds x = 1.0 the whole way
        let held = Clip::new(
            "b".into(),
            vec![Channel {
                node: 0,
                times: vec![0.0, 2.0],
                values: Keyframes::Translation(vec![
                    glm::vec3(1.0, 0.0, 0.0),
                    glm::vec3(1.0, 0.0, 0.0),
                ]),
                interpolation: Interpolation::Linear,
            }],
        );
        let mut mixer = Mixer::new(vec![slow, held]);
        mixer.activate(1).unwrap();
        mixer.advance(0.25); // both at weight 0.5; clip a at x=0.125, clip b at x=1.0
        let pose = mixer.pose(&base);
        let expected = 0.5 * 0.125 + 0.5 * 1.0;
        assert!((pose[0].translation.x - expected).abs() < 1e-5);
    }
}
