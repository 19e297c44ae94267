//! SonicSphere library - audio playback with a reactive 3D visualization

pub mod art;
pub mod camera;
pub mod cli;
pub mod params;
pub mod player;
pub mod rendering;
pub mod spectrum;
pub mod theme;
pub mod transport;
pub mod viz;
