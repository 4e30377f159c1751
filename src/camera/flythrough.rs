use nalgebra_glm as glm;

/// Seconds the camera holds at the start position before the first leg.
pub const HOLD_SECS: f32 = 3.0;

/// Scripted one-shot camera path: the eye position at the end of each leg,
/// with the leg duration in seconds.
pub const WAYPOINTS: [([f32; 3], f32); 5] = [
    ([-3.62, 1.65, -0.82], 2.0),
    ([-5.0, 1.64, -2.04], 3.0),
    ([2.62, 1.65, -4.02], 4.0),
    ([3.019, 1.65, 1.579], 5.0),
    ([-2.68, 2.04, 2.58], 6.0),
];

pub const START_POSITION: [f32; 3] = [-3.62, 1.64, 1.0];

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

struct Leg {
    from: glm::Vec3,
    to: glm::Vec3,
    start: f32,
    duration: f32,
}

/// Plays the waypoint sequence exactly once; it never loops or resets.
pub struct Flythrough {
    legs: Vec<Leg>,
    total: f32,
    elapsed: f32,
}

impl Flythrough {
    pub fn new() -> Self {
        let mut legs = Vec::with_capacity(WAYPOINTS.len());
        // The hold ends with y snapped from 1.64 to 1.65; the first leg
        // departs from there.
        let mut from = glm::vec3(-3.62, 1.65, 1.0);
        let mut start = HOLD_SECS;
        for (target, duration) in WAYPOINTS {
            let to = glm::make_vec3(&target);
            legs.push(Leg {
                from,
                to,
                start,
                duration,
            });
            from = to;
            start += duration;
        }
        Self {
            legs,
            total: start,
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt.max(0.0);
    }

    pub fn finished(&self) -> bool {
        self.elapsed >= self.total
    }

    /// Eye position at the current playhead.
    pub fn position(&self) -> glm::Vec3 {
        self.position_at(self.elapsed)
    }

    fn position_at(&self, t: f32) -> glm::Vec3 {
        if t < HOLD_SECS {
            return glm::make_vec3(&START_POSITION);
        }
        for leg in &self.legs {
            if t < leg.start + leg.duration {
                let alpha = smoothstep((t - leg.start) / leg.duration);
                return glm::lerp(&leg.from, &leg.to, alpha);
            }
        }
        self.legs.last().map(|l| l.to).unwrap_or_else(|| glm::make_vec3(&START_POSITION))
    }
}
