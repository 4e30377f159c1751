use crate::animation::mixer::MAX_SPEED;
use crate::asset::{ModelSlot, SlotState};
use crate::settings::UiSettings;

/// What the panel asked the app to do this frame.
#[derive(Default)]
pub struct PanelAction {
    /// New playback speed for the first slot's mixer.
    pub speed: Option<f32>,
    /// (slot, clip) pairs whose buttons were clicked.
    pub activations: Vec<(usize, usize)>,
}

/// Which controls the panel draws for the current slot states.
#[derive(Debug, PartialEq, Eq)]
struct PanelControls {
    /// The slider is tied to the first slot and appears once it is ready.
    speed_slider: bool,
    /// One "Play Animation N" button per clip, per ready slot.
    clip_buttons: [usize; 2],
}

fn panel_controls(slots: &[ModelSlot; 2]) -> PanelControls {
    let buttons = |slot: &ModelSlot| slot.instance().map_or(0, |i| i.mixer.clips().len());
    PanelControls {
        speed_slider: slots[0].instance().is_some(),
        clip_buttons: [buttons(&slots[0]), buttons(&slots[1])],
    }
}

pub struct Ui {
    settings: UiSettings,
}

impl Ui {
    pub fn new(settings: UiSettings) -> Self {
        Self { settings }
    }

    /// Draws the animation window and collects the frame's actions.
    pub fn show(&mut self, ctx: &egui::Context, slots: &[ModelSlot; 2]) -> PanelAction {
        let mut action = PanelAction::default();
        if !self.settings.show_animation_panel {
            return action;
        }

        let controls = panel_controls(slots);
        egui::Window::new("🎬 Animation")
            .default_pos([16.0, 16.0])
            .resizable(false)
            .show(ctx, |ui| {
                if controls.speed_slider {
                    if let Some(instance) = slots[0].instance() {
                        let mut speed = instance.mixer.speed();
                        let response = ui.add(
                            egui::Slider::new(&mut speed, 0.0..=MAX_SPEED)
                                .text("Speed")
                                .fixed_decimals(2),
                        );
                        if response.changed() {
                            action.speed = Some(speed);
                        }
                        ui.separator();
                    }
                }

                for (slot_index, slot) in slots.iter().enumerate() {
                    match slot.state() {
                        SlotState::Loading => {
                            ui.label(format!("{}: loading…", slot.label));
                        }
                        SlotState::Failed => {
                            ui.colored_label(
                                egui::Color32::LIGHT_RED,
                                format!("{}: failed to load", slot.label),
                            );
                        }
                        SlotState::Ready(_) => {
                            ui.label(slot.label);
                            // Every clip gets a button, the active one included:
                            // re-activating restarts the clip with a crossfade.
                            for clip in 0..controls.clip_buttons[slot_index] {
                                let text = format!("Play Animation {}", clip + 1);
                                if ui.button(text).clicked() {
                                    action.activations.push((slot_index, clip));
                                }
                            }
                            if slot_index + 1 < slots.len() {
                                ui.separator();
                            }
                        }
                    }
                }
            });

        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Channel, Clip, Interpolation, Keyframes, Transform};
    use crate::asset::loader::{LoadedModel, NodeData};
    use crate::asset::{ModelInstance, Placement};
    use nalgebra_glm as glm;

    fn placement() -> Placement {
        Placement {
            position: glm::vec3(0.0, 0.0, 0.0),
            yaw: 0.0,
            scale: 1.0,
        }
    }

    fn model_with_clips(count: usize) -> LoadedModel {
        let clips = (0..count)
            .map(|i| {
                Clip::new(
                    format!("clip {i}"),
                    vec![Channel {
                        node: 0,
                        times: vec![0.0, 1.0],
                        values: Keyframes::Translation(vec![
                            glm::vec3(0.0, 0.0, 0.0),
                            glm::vec3(1.0, 0.0, 0.0),
                        ]),
                        interpolation: Interpolation::Linear,
                    }],
                )
            })
            .collect();
        LoadedModel {
            name: "test".into(),
            nodes: vec![NodeData {
                name: "root".into(),
                parent: None,
                local: Transform::identity(),
            }],
            meshes: Vec::new(),
            skins: Vec::new(),
            clips,
        }
    }

    fn ready_slot(label: &'static str, clips: usize) -> ModelSlot {
        let mut slot = ModelSlot::new(label, placement());
        slot.set_ready(ModelInstance::new(model_with_clips(clips)));
        slot
    }

    #[test]
    fn no_controls_before_anything_loads() {
        let slots = [
            ModelSlot::new("model A", placement()),
            ModelSlot::new("model B", placement()),
        ];
        let controls = panel_controls(&slots);
        assert!(!controls.speed_slider);
        assert_eq!(controls.clip_buttons, [0, 0]);
    }

    #[test]
    fn ready_slot_gets_one_button_per_clip() {
        let slots = [ready_slot("model A", 3), ready_slot("model B", 2)];
        let controls = panel_controls(&slots);
        assert!(controls.speed_slider);
        assert_eq!(controls.clip_buttons, [3, 2]);
    }

    #[test]
    fn slider_is_tied_to_the_first_slot_only() {
        // second model ready, first still loading: buttons yes, slider no
        let slots = [
            ModelSlot::new("model A", placement()),
            ready_slot("model B", 4),
        ];
        let controls = panel_controls(&slots);
        assert!(!controls.speed_slider);
        assert_eq!(controls.clip_buttons, [0, 4]);
    }

    #[test]
    fn failed_slot_registers_no_controls() {
        let mut failed = ModelSlot::new("model A", placement());
        failed.set_failed();
        let slots = [failed, ready_slot("model B", 2)];
        let controls = panel_controls(&slots);
        assert!(!controls.speed_slider);
        assert_eq!(controls.clip_buttons, [0, 2]);
    }

    #[test]
    fn show_without_input_requests_nothing() {
        let ctx = egui::Context::default();
        let mut panel = Ui::new(UiSettings::default());
        let slots = [ready_slot("model A", 2), ready_slot("model B", 1)];
        let mut action = PanelAction::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            action = panel.show(ctx, &slots);
        });
        assert!(action.speed.is_none());
        assert!(action.activations.is_empty());
    }

    #[test]
    fn hidden_panel_draws_and_requests_nothing() {
        let ctx = egui::Context::default();
        let mut panel = Ui::new(UiSettings {
            show_animation_panel: false,
        });
        let slots = [ready_slot("model A", 2), ready_slot("model B", 1)];
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            let action = panel.show(ctx, &slots);
            assert!(action.activations.is_empty());
        });
        assert!(output.shapes.is_empty());
    }
}
