pub mod loader;
pub mod slot;

pub use slot::{LoadMessage, ModelInstance, ModelSlot, Placement, SlotState};
