//! Terminal UI module using ratatui.
//!
//! - `render`: Frame rendering for the login and token screens
//! - `input`: Keyboard event handling
//! - `styles`: Color palette and text styling

pub mod input;
pub mod render;
pub mod styles;
