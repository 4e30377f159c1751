pub mod flythrough;
pub mod orbit;
pub mod rig;

pub use rig::{CameraMode, CameraRig};
