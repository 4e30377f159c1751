use std::sync::mpsc;

use nalgebra_glm as glm;

use crate::animation::{Mixer, Transform};
use crate::asset::loader::{self, LoadedModel, global_transforms};
use crate::error::ViewerError;

/// Where a loaded subtree sits in the scene.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub position: glm::Vec3,
    pub yaw: f32,
    pub scale: f32,
}

impl Placement {
    pub fn matrix(&self) -> glm::Mat4 {
        glm::translation(&self.position)
            * glm::rotation(self.yaw, &glm::vec3(0.0, 1.0, 0.0))
            * glm::scaling(&glm::vec3(self.scale, self.scale, self.scale))
    }
}

/// A loaded model bound to its animation player.
pub struct ModelInstance {
    pub model: LoadedModel,
    pub mixer: Mixer,
    base: Vec<Transform>,
    pub globals: Vec<glm::Mat4>,
}

impl ModelInstance {
    pub fn new(mut model: LoadedModel) -> Self {
        let clips = std::mem::take(&mut model.clips);
        let base = model.base_pose();
        let globals = global_transforms(&model.nodes, &base);
        Self {
            model,
            mixer: Mixer::new(clips),
            base,
            globals,
        }
    }

    /// Advance playback and recompute the node hierarchy for this frame.
    pub fn advance(&mut self, dt: f32) {
        self.mixer.advance(dt);
        let pose = self.mixer.pose(&self.base);
        self.globals = global_transforms(&self.model.nodes, &pose);
    }

    /// Model-space joint matrices for one skin (`global * inverse_bind`).
    pub fn joint_matrices(&self, skin: usize) -> Vec<glm::Mat4> {
        let skin = &self.model.skins[skin];
        skin.joints
            .iter()
            .zip(&skin.inverse_bind)
            .map(|(&joint, ibm)| self.globals[joint] * ibm)
            .collect()
    }
}

pub enum SlotState {
    Loading,
    Ready(ModelInstance),
    Failed,
}

/// Result of one background load, delivered over the frame-path channel.
pub struct LoadMessage {
    pub slot: usize,
    pub path: String,
    pub result: Result<LoadedModel, ViewerError>,
}

/// One of the two model positions in the scene. Starts loading in the
/// background and stays `Loading` until its message arrives; a failure is
/// terminal (no retry).
pub struct ModelSlot {
    pub label: &'static str,
    pub placement: Placement,
    state: SlotState,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ModelSlot {
    pub fn new(label: &'static str, placement: Placement) -> Self {
        Self {
            label,
            placement,
            state: SlotState::Loading,
            task: None,
        }
    }

    /// Spawn the background load; the result comes back through `sender`.
    pub fn begin_load(&mut self, path: String, slot: usize, sender: mpsc::Sender<LoadMessage>) {
        log::info!("loading model for {}: {}", self.label, path);
        self.task = Some(tokio::spawn(async move {
            let result = loader::load(&path).await;
            let _ = sender.send(LoadMessage { slot, path, result });
        }));
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn set_ready(&mut self, instance: ModelInstance) {
        self.state = SlotState::Ready(instance);
        self.task = None;
    }

    pub fn set_failed(&mut self) {
        self.state = SlotState::Failed;
        self.task = None;
    }

    pub fn instance(&self) -> Option<&ModelInstance> {
        match &self.state {
            SlotState::Ready(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self) -> Option<&mut ModelInstance> {
        match &mut self.state {
            SlotState::Ready(instance) => Some(instance),
            _ => None,
        }
    }

    /// Per-frame tick; a slot that is not ready is skipped, not an error.
    pub fn advance(&mut self, dt: f32) {
        if let SlotState::Ready(instance) = &mut self.state {
            instance.advance(dt);
        }
    }
}

impl Drop for ModelSlot {
    fn drop(&mut self) {
        // cancel an in-flight load on teardown
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Clip;
    use crate::asset::loader::NodeData;

    fn placement() -> Placement {
        Placement {
            position: glm::vec3(-0.08, -0.03, -1.85),
            yaw: 0.0,
            scale: 0.002,
        }
    }

    fn tiny_model() -> LoadedModel {
        LoadedModel {
            name: "test".into(),
            nodes: vec![NodeData {
                name: "root".into(),
                parent: None,
                local: Transform::identity(),
            }],
            meshes: Vec::new(),
            skins: Vec::new(),
            clips: vec![Clip::new("idle".into(), Vec::new())],
        }
    }

    #[test]
    fn advancing_an_unloaded_slot_is_a_no_op() {
        let mut slot = ModelSlot::new("model A", placement());
        slot.advance(0.016);
        assert!(matches!(slot.state(), SlotState::Loading));
        assert!(slot.instance().is_none());
    }

    #[test]
    fn failed_slot_stays_failed_and_exposes_no_instance() {
        let mut slot = ModelSlot::new("model A", placement());
        slot.set_failed();
        slot.advance(0.016);
        assert!(matches!(slot.state(), SlotState::Failed));
        assert!(slot.instance().is_none());
    }

    #[test]
    fn ready_slot_drives_its_mixer() {
        let mut slot = ModelSlot::new("model A", placement());
        slot.set_ready(ModelInstance::new(tiny_model()));
        slot.advance(0.5);
        assert!((slot.instance().unwrap().mixer.time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn instance_takes_clips_from_the_model() {
        let instance = ModelInstance::new(tiny_model());
        assert!(instance.model.clips.is_empty());
        assert_eq!(instance.mixer.clips().len(), 1);
        assert_eq!(instance.mixer.active_clip(), Some(0));
    }

    #[test]
    fn placement_matrix_scales_then_moves() {
        let m = placement().matrix();
        let p = m * glm::vec4(100.0, 0.0, 0.0, 1.0);
        assert!((p.x - (-0.08 + 0.2)).abs() < 1e-5);
        assert!((p.z - -1.85).abs() < 1e-5);
    }
}
