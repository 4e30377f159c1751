use nalgebra_glm as glm;

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_STEP: f32 = 0.1;
/// Velocity half-life-ish time constant for release damping, seconds.
const DAMPING_TAU: f32 = 0.09;
/// Input velocities are tuned for a 60 Hz frame; other rates scale by dt.
const REFERENCE_DT: f32 = 1.0 / 60.0;
const MIN_RADIUS: f32 = 0.5;
const MAX_RADIUS: f32 = 40.0;
const MIN_PITCH: f32 = 0.01;
const MAX_PITCH: f32 = std::f32::consts::PI - 0.01;

/// User-driven orbit around a fixed look-at target, with damped motion.
///
/// Yaw/pitch/radius are spherical coordinates of the eye around the target;
/// input accumulates velocity that decays exponentially each frame, so
/// releasing the pointer decelerates instead of stopping dead.
pub struct OrbitCamera {
    pub target: glm::Vec3,
    yaw: f32,
    pitch: f32,
    radius: f32,
    vel_yaw: f32,
    vel_pitch: f32,
    vel_zoom: f32,
}

impl OrbitCamera {
    pub fn new(eye: glm::Vec3, target: glm::Vec3) -> Self {
        let mut cam = Self {
            target,
            yaw: 0.0,
            pitch: std::f32::consts::FRAC_PI_2,
            radius: 1.0,
            vel_yaw: 0.0,
            vel_pitch: 0.0,
            vel_zoom: 0.0,
        };
        cam.set_eye(eye);
        cam
    }

    /// Re-derive the spherical coordinates from a world-space eye position.
    /// Used to hand the camera over from the scripted flythrough without a
    /// visible jump.
    pub fn set_eye(&mut self, eye: glm::Vec3) {
        let offset = eye - self.target;
        self.radius = glm::length(&offset).clamp(MIN_RADIUS, MAX_RADIUS);
        self.yaw = offset.x.atan2(offset.z);
        self.pitch = (offset.y / self.radius.max(1e-6))
            .clamp(-1.0, 1.0)
            .acos()
            .clamp(MIN_PITCH, MAX_PITCH);
        self.vel_yaw = 0.0;
        self.vel_pitch = 0.0;
        self.vel_zoom = 0.0;
    }

    /// Pointer-drag input in pixels.
    pub fn on_rotate(&mut self, dx: f32, dy: f32) {
        self.vel_yaw -= dx * ROTATE_SPEED;
        self.vel_pitch -= dy * ROTATE_SPEED;
    }

    /// Wheel/pinch input; positive zooms in (dolly toward the target).
    pub fn on_zoom(&mut self, amount: f32) {
        self.vel_zoom -= amount * ZOOM_STEP;
    }

    /// Apply pending velocity and damp it toward rest. Must run once per
    /// frame whether or not any input arrived.
    pub fn update(&mut self, dt: f32) {
        let scale = dt.max(0.0) / REFERENCE_DT;
        self.yaw += self.vel_yaw * scale;
        self.pitch = (self.pitch + self.vel_pitch * scale).clamp(MIN_PITCH, MAX_PITCH);
        self.radius = (self.radius * (self.vel_zoom * scale).exp()).clamp(MIN_RADIUS, MAX_RADIUS);

        let decay = (-dt.max(0.0) / DAMPING_TAU).exp();
        self.vel_yaw *= decay;
        self.vel_pitch *= decay;
        self.vel_zoom *= decay;
    }

    pub fn eye(&self) -> glm::Vec3 {
        let sin_pitch = self.pitch.sin();
        self.target
            + glm::vec3(
                self.radius * sin_pitch * self.yaw.sin(),
                self.radius * self.pitch.cos(),
                self.radius * sin_pitch * self.yaw.cos(),
            )
    }

    #[allow(dead_code)]
    pub fn radius(&self) -> f32 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(glm::vec3(-3.62, 1.64, 1.0), glm::vec3(0.0, 0.75, 0.0))
    }

    #[test]
    fn set_eye_round_trips() {
        let cam = camera();
        let eye = cam.eye();
        assert!((eye.x - -3.62).abs() < 1e-4);
        assert!((eye.y - 1.64).abs() < 1e-4);
        assert!((eye.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn drag_velocity_damps_to_rest() {
        let mut cam = camera();
        cam.on_rotate(40.0, 0.0);
        cam.update(1.0 / 60.0);
        let first_step = cam.vel_yaw.abs();
        assert!(first_step > 0.0);
        for _ in 0..240 {
            cam.update(1.0 / 60.0);
        }
        assert!(cam.vel_yaw.abs() < 1e-4);
        let settled = cam.eye();
        cam.update(1.0 / 60.0);
        let after = cam.eye();
        assert!(glm::length(&(after - settled)) < 1e-3);
    }

    #[test]
    fn drag_response_is_comparable_across_frame_rates() {
        let total = |dt: f32| {
            let mut cam = camera();
            let start = cam.yaw;
            cam.on_rotate(40.0, 0.0);
            let steps = (2.0 / dt) as usize;
            for _ in 0..steps {
                cam.update(dt);
            }
            (cam.yaw - start).abs()
        };
        let at_120 = total(1.0 / 120.0);
        let at_30 = total(1.0 / 30.0);
        assert!(at_120 > 0.0);
        assert!((at_30 - at_120).abs() / at_120 < 0.2, "{at_30} vs {at_120}");
    }

    #[test]
    fn pitch_is_kept_off_the_poles() {
        let mut cam = camera();
        for _ in 0..200 {
            cam.on_rotate(0.0, -500.0);
            cam.update(1.0 / 60.0);
        }
        assert!(cam.pitch >= MIN_PITCH && cam.pitch <= MAX_PITCH);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = camera();
        for _ in 0..500 {
            cam.on_zoom(10.0);
            cam.update(1.0 / 60.0);
        }
        assert!(cam.radius() >= MIN_RADIUS);
        for _ in 0..500 {
            cam.on_zoom(-10.0);
            cam.update(1.0 / 60.0);
        }
        assert!(cam.radius() <= MAX_RADIUS);
    }
}
