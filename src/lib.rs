// Library surface for the binary and the headless integration tests.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod capture;
pub mod config;
pub mod controller;
pub mod dictation;
pub mod error;
pub mod gate;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod sequencer;
pub mod timer;
pub mod ui;

pub use controller::{SessionController, SessionPhase, SubmitOutcome, SubmitTrigger};
pub use error::SessionError;
