pub mod culling;
pub mod matrices;
pub mod renderer;
pub mod sort;
pub mod state;
pub mod stats;

pub use matrices::MatrixSet;
pub use renderer::{RenderOptions, Renderer};
pub use state::{RenderState, StateCache};
pub use stats::RenderStats;
