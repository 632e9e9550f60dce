use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{debug, info, warn};

use crate::backend::{lock_sequence, SharedSequence};
use crate::error::Result;
use crate::models::{Event, EventKind, DEFAULT_DELAY};

/// A raw notification delivered by the capture service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    KeyDown { name: String },
    ButtonDown { button: String, x: i32, y: i32 },
}

/// Callback the capture service invokes on its own thread for every notification.
pub type CaptureSink = Arc<dyn Fn(RawInput) + Send + Sync>;

/// OS-level listener for key-down and mouse-button-down notifications.
pub trait CaptureService: Send {
    fn install(&mut self, sink: CaptureSink) -> Result<()>;

    /// Best-effort teardown; failures are logged, never returned.
    fn remove(&mut self);
}

/// Tells the recorder whether a click landed on the application's own controls.
pub trait SurfaceFilter: Send + Sync {
    fn is_own_surface(&self, x: i32, y: i32) -> bool;
}

impl<F> SurfaceFilter for F
where
    F: Fn(i32, i32) -> bool + Send + Sync,
{
    fn is_own_surface(&self, x: i32, y: i32) -> bool {
        self(x, y)
    }
}

/// Filter for front ends without clickable surfaces of their own.
pub struct NoOwnSurface;

impl SurfaceFilter for NoOwnSurface {
    fn is_own_surface(&self, _x: i32, _y: i32) -> bool {
        false
    }
}

pub struct Recorder {
    events: SharedSequence,
    enabled: Arc<AtomicBool>,
    surface: Arc<dyn SurfaceFilter>,
    capture: Box<dyn CaptureService>,
    default_delay: f64,
}

impl Recorder {
    pub fn new(events: SharedSequence, capture: Box<dyn CaptureService>) -> Self {
        Self {
            events,
            enabled: Arc::new(AtomicBool::new(false)),
            surface: Arc::new(NoOwnSurface),
            capture,
            default_delay: DEFAULT_DELAY,
        }
    }

    pub fn with_surface_filter(mut self, surface: Arc<dyn SurfaceFilter>) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_default_delay(mut self, delay: f64) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Installs the listeners. Calling it while already recording does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.is_enabled() {
            return Ok(());
        }

        self.enabled.store(true, Ordering::SeqCst);
        if let Err(err) = self.capture.install(self.sink()) {
            self.enabled.store(false, Ordering::SeqCst);
            return Err(err);
        }

        info!("recording started");
        Ok(())
    }

    /// Removes the listeners. Hotkeys sharing the OS hook must be re-bound by the caller.
    pub fn stop(&mut self) {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        self.capture.remove();
        info!("recording stopped");
    }

    /// Flips recording on or off and returns the new state.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.is_enabled() {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.is_enabled())
    }

    fn sink(&self) -> CaptureSink {
        let dispatcher = Dispatcher {
            events: Arc::clone(&self.events),
            enabled: Arc::clone(&self.enabled),
            surface: Arc::clone(&self.surface),
            delay: self.default_delay,
        };
        Arc::new(move |input| dispatcher.handle(input))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

// Runs on the capture service's thread: holds the sequence lock only for the push.
struct Dispatcher {
    events: SharedSequence,
    enabled: Arc<AtomicBool>,
    surface: Arc<dyn SurfaceFilter>,
    delay: f64,
}

impl Dispatcher {
    fn handle(&self, input: RawInput) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }

        let (kind, value) = match input {
            RawInput::KeyDown { name } => (EventKind::Key, name),
            RawInput::ButtonDown { button, x, y } => {
                if self.surface.is_own_surface(x, y) {
                    debug!(x, y, "click on own surface ignored");
                    return;
                }
                (EventKind::MouseButton, button)
            }
        };

        if value.is_empty() {
            warn!(%kind, "ignoring notification without a name");
            return;
        }

        let event = Event {
            kind,
            value,
            delay: self.delay,
            mode: Default::default(),
        };
        lock_sequence(&self.events).append(event);
    }
}
