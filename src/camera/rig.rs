use nalgebra_glm as glm;

use crate::camera::flythrough::Flythrough;
use crate::camera::orbit::OrbitCamera;

pub const FOV_Y_DEGREES: f32 = 75.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 100.0;

/// Who owns the camera position this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    /// The one-shot flythrough is still playing.
    Scripted,
    /// Orbit control took over; the flythrough is cancelled for good.
    User,
}

/// Perspective camera with a single owner for its position at any time:
/// the scripted flythrough until it finishes or the first user input,
/// the orbit controller afterwards.
pub struct CameraRig {
    mode: CameraMode,
    flythrough: Flythrough,
    orbit: OrbitCamera,
    aspect: f32,
}

impl CameraRig {
    pub fn new(aspect: f32) -> Self {
        let flythrough = Flythrough::new();
        let orbit = OrbitCamera::new(flythrough.position(), glm::vec3(0.0, 0.75, 0.0));
        Self {
            mode: CameraMode::Scripted,
            flythrough,
            orbit,
            aspect,
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Pointer drag. Any input cancels what is left of the flythrough.
    pub fn on_rotate(&mut self, dx: f32, dy: f32) {
        self.take_over();
        self.orbit.on_rotate(dx, dy);
    }

    /// Wheel/pinch dolly. Same takeover rule as rotation.
    pub fn on_zoom(&mut self, amount: f32) {
        self.take_over();
        self.orbit.on_zoom(amount);
    }

    fn take_over(&mut self) {
        if self.mode == CameraMode::Scripted {
            self.orbit.set_eye(self.flythrough.position());
            self.mode = CameraMode::User;
        }
    }

    /// Advance whichever motion source owns the camera. Runs once per frame.
    pub fn update(&mut self, dt: f32) {
        match self.mode {
            CameraMode::Scripted => {
                self.flythrough.advance(dt);
                if self.flythrough.finished() {
                    self.orbit.set_eye(self.flythrough.position());
                    self.mode = CameraMode::User;
                }
            }
            CameraMode::User => self.orbit.update(dt),
        }
    }

    pub fn eye(&self) -> glm::Vec3 {
        match self.mode {
            CameraMode::Scripted => self.flythrough.position(),
            CameraMode::User => self.orbit.eye(),
        }
    }

    pub fn target(&self) -> glm::Vec3 {
        self.orbit.target
    }

    pub fn view_proj(&self) -> glm::Mat4 {
        let proj = glm::perspective_rh_zo(self.aspect, FOV_Y_DEGREES.to_radians(), NEAR, FAR);
        let view = glm::look_at(&self.eye(), &self.orbit.target, &glm::vec3(0.0, 1.0, 0.0));
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::flythrough::{START_POSITION, WAYPOINTS};

    #[test]
    fn starts_scripted_at_the_hold_position() {
        let rig = CameraRig::new(16.0 / 9.0);
        assert_eq!(rig.mode(), CameraMode::Scripted);
        let eye = rig.eye();
        assert!((eye.x - START_POSITION[0]).abs() < 1e-5);
    }

    #[test]
    fn first_input_cancels_the_flythrough() {
        let mut rig = CameraRig::new(16.0 / 9.0);
        rig.update(4.0); // mid-flythrough
        let before = rig.eye();
        rig.on_rotate(0.0, 0.0);
        assert_eq!(rig.mode(), CameraMode::User);
        // handoff is continuous: same eye, now owned by the orbit controller
        let after = rig.eye();
        assert!(nalgebra_glm::length(&(after - before)) < 1e-4);
        // the script never resumes
        rig.update(60.0);
        assert_eq!(rig.mode(), CameraMode::User);
    }

    #[test]
    fn flythrough_completion_hands_over_to_orbit() {
        let mut rig = CameraRig::new(1.0);
        for _ in 0..240 {
            rig.update(0.1);
        }
        assert_eq!(rig.mode(), CameraMode::User);
        let last = WAYPOINTS[WAYPOINTS.len() - 1].0;
        let eye = rig.eye();
        assert!((eye.y - last[1]).abs() < 1e-3);
    }

    #[test]
    fn aspect_rejects_degenerate_values() {
        let mut rig = CameraRig::new(1.5);
        rig.set_aspect(0.0);
        rig.set_aspect(f32::NAN);
        assert_eq!(rig.aspect(), 1.5);
        rig.set_aspect(2.0);
        assert_eq!(rig.aspect(), 2.0);
    }
}
