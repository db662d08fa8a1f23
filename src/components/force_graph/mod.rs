//! Canvas-backed note graph: storage, layout, viewport, input handling and persistence.

mod component;
pub mod config;
pub mod controller;
pub mod error;
pub mod layout;
mod render;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;
pub mod viewport;

pub use component::GraphNotesCanvas;
pub use config::GraphConfig;
