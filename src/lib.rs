//! KeyLoop: record key presses and mouse clicks, then replay them in a loop.
//!
//! Events are captured into a shared [`EventSequence`], edited in place,
//! stored as named JSON configs, and replayed by a background player that
//! loops until stopped. Global hotkeys start and stop playback.

pub mod app;
pub mod backend;
pub mod config;
pub mod console;
pub mod error;
pub mod models;

pub use app::{Backends, Flow, KeyLoopApp};
pub use config::Settings;
pub use error::{Error, Result};
pub use models::{Event, EventKind, EventSequence, Mode};
