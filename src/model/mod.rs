//! Data model: PDF values, color spaces, graphics and text state.

pub mod color;
pub mod objects;
pub mod state;
