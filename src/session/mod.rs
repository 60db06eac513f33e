pub mod controller;
mod sampler;
pub mod state;

pub use controller::SessionController;
pub use state::{CameraState, ChannelState, SessionState};
