pub mod api;
pub mod camera;
pub mod channel;
pub mod config;
pub mod exercise;
pub mod session;
pub mod workout;

pub use api::ApiClient;
pub use camera::{Camera, CameraConfig, CameraProvider, Frame};
pub use config::Config;
pub use exercise::ExerciseKind;
pub use session::{CameraState, ChannelState, SessionController, SessionState};
pub use workout::WorkoutRecord;
