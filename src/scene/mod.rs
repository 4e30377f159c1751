use nalgebra_glm as glm;

use crate::asset::{ModelSlot, Placement};

/// Shadow-receiving ground plane.
pub struct Floor {
    /// Edge length of the square plane.
    pub size: f32,
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
}

pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

pub struct ShadowSettings {
    pub map_size: u32,
    /// Half-extent of the orthographic shadow frustum.
    pub extent: f32,
    pub far: f32,
    pub bias: f32,
}

pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: glm::Vec3,
    pub shadow: ShadowSettings,
}

impl DirectionalLight {
    /// Direction the light travels (toward the origin).
    pub fn direction(&self) -> glm::Vec3 {
        glm::normalize(&-self.position)
    }

    pub fn view_proj(&self) -> glm::Mat4 {
        let e = self.shadow.extent;
        let proj = glm::ortho_rh_zo(-e, e, -e, e, 0.1, self.shadow.far);
        let view = glm::look_at(
            &self.position,
            &glm::vec3(0.0, 0.0, 0.0),
            &glm::vec3(0.0, 1.0, 0.0),
        );
        proj * view
    }
}

/// The static environment plus the two model slots.
pub struct Scene {
    pub floor: Floor,
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    pub slots: [ModelSlot; 2],
}

impl Scene {
    pub fn new() -> Self {
        Self {
            floor: Floor {
                size: 10.0,
                // #444444 in linear space
                color: [0.058, 0.058, 0.058],
                roughness: 0.5,
                metalness: 0.0,
            },
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: 2.4,
            },
            sun: DirectionalLight {
                color: [1.0, 1.0, 1.0],
                intensity: 1.8,
                position: glm::vec3(5.0, 5.0, 5.0),
                shadow: ShadowSettings {
                    map_size: 1024,
                    extent: 7.0,
                    far: 15.0,
                    bias: -0.005,
                },
            },
            slots: [
                ModelSlot::new(
                    "model A",
                    Placement {
                        position: glm::vec3(-0.08, -0.03, -1.85),
                        yaw: 0.0,
                        scale: 0.002,
                    },
                ),
                ModelSlot::new(
                    "model B",
                    Placement {
                        position: glm::vec3(-0.28, -0.03, 1.5),
                        yaw: std::f32::consts::PI,
                        scale: 0.002,
                    },
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sun_points_back_at_the_origin() {
        let scene = Scene::new();
        let dir = scene.sun.direction();
        assert!(dir.x < 0.0 && dir.y < 0.0 && dir.z < 0.0);
        assert!((glm::length(&dir) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shadow_frustum_covers_both_model_placements() {
        let scene = Scene::new();
        let vp = scene.sun.view_proj();
        for slot in &scene.slots {
            let p = slot.placement.position;
            let clip = vp * glm::vec4(p.x, p.y, p.z, 1.0);
            let ndc = clip / clip.w;
            assert!(ndc.x.abs() <= 1.0, "{} outside shadow frustum: {ndc:?}", slot.label);
            assert!(ndc.y.abs() <= 1.0);
            assert!(ndc.z >= 0.0 && ndc.z <= 1.0);
        }
    }
}
