use winit::event_loop::{ControlFlow, EventLoop};

mod animation;
mod app;
mod asset;
mod camera;
mod clock;
mod error;
mod render;
mod scene;
mod settings;
mod ui;

/// Config directory name used by confy.
pub const CONFY_APP_NAME: &str = "diorama";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Positional arguments override the configured model paths
    let args: Vec<String> = std::env::args().collect();
    let model_paths = [args.get(1).cloned(), args.get(2).cloned()];

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let runtime = tokio::runtime::Runtime::new()?;
    let mut handler = app::AppHandler::new(runtime, model_paths);

    event_loop.run_app(&mut handler)?;

    Ok(())
}
