pub mod controller;
pub mod driver;
pub mod media;
pub mod ticker;

pub use controller::{SessionController, SessionState, COUNTDOWN_FROM};
pub use driver::GameDriver;
pub use media::{error_message, extract_video_id, MediaError, MediaEvent, MediaPlayer, SimulatedPlayer};
pub use ticker::{TickControl, Ticker};
