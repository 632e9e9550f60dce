pub mod headless;
pub mod hotkeys;
pub mod keys;
pub mod player;
pub mod recorder;
pub mod storage;
#[cfg(windows)]
pub mod win32;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::models::{EventKind, EventSequence};

pub use headless::{DryRunInjector, NoCapture, NoHotkeys};
pub use hotkeys::{Hotkey, HotkeyBackend, HotkeyManager};
pub use player::{Pacer, PlaybackState, Player, ThreadPacer};
pub use recorder::{CaptureService, CaptureSink, RawInput, Recorder, SurfaceFilter};
pub use storage::ConfigStore;

/// The live event list, shared between the recorder, the player and the editor.
pub type SharedSequence = Arc<Mutex<EventSequence>>;

/// Locks the shared sequence. A panic on another thread never leaves the list
/// half-mutated (every mutation is a single Vec operation), so poisoning is ignored.
pub(crate) fn lock_sequence(sequence: &SharedSequence) -> MutexGuard<'_, EventSequence> {
    sequence.lock().unwrap_or_else(PoisonError::into_inner)
}

// commands sent by the hotkey thread (and the console reader) to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartPlayback,
    StopPlayback,
    Input(String),
    Exit,
}

/// Synthesizes key and mouse-button input.
pub trait InputInjector: Send + Sync {
    fn tap(&self, kind: EventKind, value: &str) -> Result<()>;
    fn press(&self, kind: EventKind, value: &str) -> Result<()>;
    fn release(&self, kind: EventKind, value: &str) -> Result<()>;
}
