pub mod clip;
pub mod mixer;

pub use clip::{Channel, Clip, Interpolation, Keyframes, Transform};
pub use mixer::Mixer;
