use std::sync::Arc;
use std::sync::mpsc;

use egui_wgpu::ScreenDescriptor;
use egui_winit::State;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::window::Window;

use crate::asset::{LoadMessage, ModelInstance};
use crate::camera::CameraRig;
use crate::clock::FrameClock;
use crate::error::ViewerError;
use crate::render::Renderer;
use crate::scene::Scene;
use crate::settings::Settings;
use crate::ui::{PanelAction, Ui};

pub struct EventResponse {
    pub repaint: bool,
    pub exit: bool,
}

/// Everything the viewer needs for a frame, owned in one place.
pub struct App {
    pub window: Arc<Window>,
    renderer: Renderer,
    scene: Scene,
    rig: CameraRig,
    ui: Ui,
    clock: FrameClock,
    egui_state: State,
    egui_wants_pointer: bool,
    settings: Settings,
    load_rx: mpsc::Receiver<LoadMessage>,
    mouse_pressed: bool,
    last_cursor: Option<(f64, f64)>,
}

impl App {
    pub async fn new(
        window: Arc<Window>,
        overrides: [Option<String>; 2],
    ) -> Result<Self, ViewerError> {
        let settings = Settings::load();
        let mut scene = Scene::new();

        let renderer = Renderer::new(&window, &scene).await?;

        let egui_state = State::new(
            renderer.egui_context(),
            egui::viewport::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        // Kick off both model loads up front; results arrive on the frame path.
        let (load_tx, load_rx) = mpsc::channel();
        let [override_a, override_b] = overrides;
        let paths = [
            override_a.unwrap_or_else(|| settings.scene.model_a.clone()),
            override_b.unwrap_or_else(|| settings.scene.model_b.clone()),
        ];
        for (slot, path) in paths.into_iter().enumerate() {
            scene.slots[slot].begin_load(path, slot, load_tx.clone());
        }

        let size = window.inner_size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        let rig = CameraRig::new(aspect);

        let ui = Ui::new(settings.ui.clone());

        Ok(Self {
            window,
            renderer,
            scene,
            rig,
            ui,
            clock: FrameClock::new(),
            egui_state,
            egui_wants_pointer: false,
            settings,
            load_rx,
            mouse_pressed: false,
            last_cursor: None,
        })
    }

    pub fn handle_event(&mut self, event: &WindowEvent) -> EventResponse {
        // Let egui see the event first
        let egui_response = self.egui_state.on_window_event(&self.window, event);

        match event {
            WindowEvent::CloseRequested => {
                self.save_settings();
                return EventResponse {
                    repaint: false,
                    exit: true,
                };
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !egui_response.consumed
                    && event.logical_key
                        == winit::keyboard::Key::Named(winit::keyboard::NamedKey::Escape)
                {
                    self.save_settings();
                    return EventResponse {
                        repaint: false,
                        exit: true,
                    };
                }
            }
            WindowEvent::Resized(size) => {
                self.renderer.resize(*size, self.window.scale_factor());
                let [width, height] = self.renderer.surface_size();
                self.rig.set_aspect(width as f32 / height as f32);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.renderer.resize(self.window.inner_size(), *scale_factor);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if self.egui_wants_pointer {
                    return EventResponse {
                        repaint: egui_response.repaint,
                        exit: false,
                    };
                }
                self.mouse_pressed = *state == ElementState::Pressed;
                if !self.mouse_pressed {
                    self.last_cursor = None;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.egui_wants_pointer {
                    return EventResponse {
                        repaint: egui_response.repaint,
                        exit: false,
                    };
                }
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_cursor {
                        let dx = (position.x - last_x) as f32;
                        let dy = (position.y - last_y) as f32;
                        self.rig.on_rotate(dx, dy);
                    }
                }
                self.last_cursor = Some((position.x, position.y));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if self.egui_wants_pointer {
                    return EventResponse {
                        repaint: egui_response.repaint,
                        exit: false,
                    };
                }
                match delta {
                    MouseScrollDelta::LineDelta(_, y) => self.rig.on_zoom(*y),
                    MouseScrollDelta::PixelDelta(pos) => self.rig.on_zoom(pos.y as f32 * 0.05),
                }
            }
            WindowEvent::PinchGesture { delta, .. } => {
                if !self.egui_wants_pointer {
                    self.rig.on_zoom(*delta as f32 * 10.0);
                }
            }
            _ => {}
        }

        EventResponse {
            repaint: egui_response.repaint,
            exit: false,
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.drain_load_results();

        let dt = self.clock.tick();
        for slot in &mut self.scene.slots {
            slot.advance(dt);
        }
        self.rig.update(dt);

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let egui_ctx = self.renderer.egui_context();

        let mut action = PanelAction::default();
        let full_output = egui_ctx.run(raw_input, |ctx| {
            action = self.ui.show(ctx, &self.scene.slots);
        });
        self.egui_wants_pointer = egui_ctx.wants_pointer_input();

        self.apply_panel_action(action);

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);
        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: self.renderer.surface_size(),
            pixels_per_point: self.renderer.pixels_per_point(),
        };

        for slot in 0..self.scene.slots.len() {
            if let Some(instance) = self.scene.slots[slot].instance() {
                let placement = self.scene.slots[slot].placement;
                self.renderer.update_slot(slot, instance, &placement);
            }
        }

        self.renderer.render(
            &self.scene,
            &self.rig,
            paint_jobs,
            full_output.textures_delta,
            screen_descriptor,
        )
    }

    /// Finished background loads come in here, at most a handful per run.
    fn drain_load_results(&mut self) {
        while let Ok(message) = self.load_rx.try_recv() {
            let label = self.scene.slots[message.slot].label;
            match message.result {
                Ok(model) => {
                    let instance = ModelInstance::new(model);
                    self.renderer.upload_model(message.slot, &instance);
                    log::info!(
                        "{label} ready: {} ({} clip(s))",
                        message.path,
                        instance.mixer.clips().len()
                    );
                    self.scene.slots[message.slot].set_ready(instance);
                }
                Err(err) => {
                    log::error!("{label} failed to load {}: {err}", message.path);
                    self.scene.slots[message.slot].set_failed();
                }
            }
        }
    }

    fn save_settings(&self) {
        self.settings.scene.save();
        self.settings.ui.save();
    }

    fn apply_panel_action(&mut self, action: PanelAction) {
        if let Some(speed) = action.speed {
            // The slider drives the first slot's mixer only.
            if let Some(instance) = self.scene.slots[0].instance_mut() {
                instance.mixer.set_speed(speed);
            }
        }
        for (slot, clip) in action.activations {
            let label = self.scene.slots[slot].label;
            if let Some(instance) = self.scene.slots[slot].instance_mut() {
                if let Err(err) = instance.mixer.activate(clip) {
                    log::warn!("{label}: {err}");
                }
            }
        }
    }
}
