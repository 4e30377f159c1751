pub mod mesh;
pub mod renderer;

pub use renderer::Renderer;
