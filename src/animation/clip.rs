use nalgebra_glm as glm;

/// Local TRS of one scene-graph node.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: glm::vec3(0.0, 0.0, 0.0),
            rotation: glm::Quat::identity(),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }

    pub fn matrix(&self) -> glm::Mat4 {
        glm::translation(&self.translation)
            * glm::quat_to_mat4(&self.rotation)
            * glm::scaling(&self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone)]
pub enum Keyframes {
    Translation(Vec<glm::Vec3>),
    Rotation(Vec<glm::Quat>),
    Scale(Vec<glm::Vec3>),
}

/// One animated property of one node.
#[derive(Debug, Clone)]
pub struct Channel {
    pub node: usize,
    pub times: Vec<f32>,
    pub values: Keyframes,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Copy)]
pub enum Sampled {
    Translation(glm::Vec3),
    Rotation(glm::Quat),
    Scale(glm::Vec3),
}

impl Channel {
    /// Sample the channel at `t` seconds, clamping outside the keyframe range.
    pub fn sample(&self, t: f32) -> Sampled {
        let (i0, i1, alpha) = self.span(t);
        match &self.values {
            Keyframes::Translation(v) => Sampled::Translation(glm::lerp(&v[i0], &v[i1], alpha)),
            Keyframes::Rotation(q) => Sampled::Rotation(glm::quat_slerp(&q[i0], &q[i1], alpha)),
            Keyframes::Scale(v) => Sampled::Scale(glm::lerp(&v[i0], &v[i1], alpha)),
        }
    }

    fn span(&self, t: f32) -> (usize, usize, f32) {
        let times = &self.times;
        let n = times.len();
        if n == 0 {
            return (0, 0, 0.0);
        }
        if t <= times[0] {
            return (0, 0, 0.0);
        }
        if t >= times[n - 1] {
            return (n - 1, n - 1, 0.0);
        }
        // first keyframe strictly after t
        let i1 = times.partition_point(|&k| k <= t);
        let i0 = i1 - 1;
        let alpha = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear => {
                let dt = times[i1] - times[i0];
                if dt > 0.0 { (t - times[i0]) / dt } else { 0.0 }
            }
        };
        (i0, i1, alpha)
    }
}

/// An immutable named set of keyframe tracks for one model.
#[derive(Debug, Clone)]
pub struct Clip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl Clip {
    pub fn new(name: String, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0_f32, f32::max);
        Self {
            name,
            duration,
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation_channel(interpolation: Interpolation) -> Channel {
        Channel {
            node: 0,
            times: vec![0.0, 1.0, 3.0],
            values: Keyframes::Translation(vec![
                glm::vec3(0.0, 0.0, 0.0),
                glm::vec3(2.0, 0.0, 0.0),
                glm::vec3(2.0, 4.0, 0.0),
            ]),
            interpolation,
        }
    }

    fn sampled_vec3(s: Sampled) -> glm::Vec3 {
        match s {
            Sampled::Translation(v) | Sampled::Scale(v) => v,
            Sampled::Rotation(_) => panic!("expected vec3 sample"),
        }
    }

    #[test]
    fn linear_interpolates_between_keyframes() {
        let ch = translation_channel(Interpolation::Linear);
        let v = sampled_vec3(ch.sample(0.5));
        assert!((v.x - 1.0).abs() < 1e-6);
        let v = sampled_vec3(ch.sample(2.0));
        assert!((v.x - 2.0).abs() < 1e-6);
        assert!((v.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn step_holds_previous_keyframe() {
        let ch = translation_channel(Interpolation::Step);
        let v = sampled_vec3(ch.sample(0.99));
        assert_eq!(v.x, 0.0);
        let v = sampled_vec3(ch.sample(1.0));
        assert_eq!(v.x, 2.0);
    }

    #[test]
    fn sampling_clamps_outside_range() {
        let ch = translation_channel(Interpolation::Linear);
        assert_eq!(sampled_vec3(ch.sample(-1.0)).x, 0.0);
        let v = sampled_vec3(ch.sample(10.0));
        assert_eq!(v.y, 4.0);
    }

    #[test]
    fn clip_duration_is_longest_track() {
        let clip = Clip::new(
            "walk".into(),
            vec![
                translation_channel(Interpolation::Linear),
                Channel {
                    node: 1,
                    times: vec![0.0, 5.0],
                    values: Keyframes::Scale(vec![glm::vec3(1.0, 1.0, 1.0); 2]),
                    interpolation: Interpolation::Linear,
                },
            ],
        );
        assert_eq!(clip.duration, 5.0);
    }
}
