use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glTF import error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("clip index {index} out of range ({count} clips)")]
    ClipIndex { index: usize, count: usize },

    #[error("no compatible GPU adapter: {0}")]
    Gpu(String),

    #[error(transparent)]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
}

impl From<reqwest::Error> for ViewerError {
    fn from(err: reqwest::Error) -> Self {
        ViewerError::Network(err.to_string())
    }
}
