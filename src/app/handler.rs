use std::sync::Arc;

use tokio::runtime::Runtime;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::app::app::App;

/// Owns the tokio runtime and the (lazily created) application state.
pub struct AppHandler {
    app: Option<App>,
    /// CLI overrides for the two model slots.
    model_paths: [Option<String>; 2],
    runtime: Runtime,
}

impl AppHandler {
    pub fn new(runtime: Runtime, model_paths: [Option<String>; 2]) -> Self {
        Self {
            app: None,
            model_paths,
            runtime,
        }
    }
}

impl ApplicationHandler for AppHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Diorama - Animated Scene Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        // block_on also provides the runtime context for the spawned loads
        match self
            .runtime
            .block_on(App::new(window, self.model_paths.clone()))
        {
            Ok(app) => self.app = Some(app),
            Err(e) => {
                log::error!("failed to initialize: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(app) = &mut self.app {
            let response = app.handle_event(&event);
            if response.repaint {
                app.window.request_redraw();
            }
            if response.exit {
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &mut self.app {
            let _guard = self.runtime.enter();
            if let Err(e) = app.render() {
                log::error!("render error: {e:?}");
            }
            app.window.request_redraw();
        }
    }
}
