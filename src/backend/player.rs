use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{lock_sequence, InputInjector, SharedSequence};
use crate::error::{Error, Result};
use crate::models::{Event, Mode};

/// Pause between two passes over the sequence.
pub const PASS_PAUSE: Duration = Duration::from_millis(200);

/// Source of the player's waits. Tests swap in a pacer that records instead of sleeping.
pub trait Pacer: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

/// Replays the shared sequence in a loop on a background thread.
///
/// At most one worker dispatches at a time: each worker owns its own running
/// flag, and `stop` clears it. A worker that is still finishing a sleep after
/// `stop` never dispatches again, so a quick `stop`/`start` cannot produce two
/// interleaved replays.
pub struct Player {
    injector: Arc<dyn InputInjector>,
    pacer: Arc<dyn Pacer>,
    pass_pause: Duration,
    worker: Mutex<Worker>,
}

#[derive(Default)]
struct Worker {
    running: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl Player {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            injector,
            pacer: Arc::new(ThreadPacer),
            pass_pause: PASS_PAUSE,
            worker: Mutex::new(Worker::default()),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_pass_pause(mut self, pass_pause: Duration) -> Self {
        self.pass_pause = pass_pause;
        self
    }

    /// Starts looping over `sequence`.
    ///
    /// Returns `Ok(false)` when playback was already running, and
    /// [`Error::EmptySequence`] when there is nothing to play.
    pub fn start(&self, sequence: &SharedSequence) -> Result<bool> {
        let mut worker = self.lock_worker();
        if worker.is_running() {
            debug!("playback already running, start ignored");
            return Ok(false);
        }

        let len = lock_sequence(sequence).len();
        if len == 0 {
            return Err(Error::EmptySequence);
        }

        let running = Arc::new(AtomicBool::new(true));
        let playback = PlaybackLoop {
            sequence: Arc::clone(sequence),
            injector: Arc::clone(&self.injector),
            pacer: Arc::clone(&self.pacer),
            pass_pause: self.pass_pause,
            running: Arc::clone(&running),
        };

        let handle = thread::Builder::new()
            .name("keyloop-player".into())
            .spawn(move || playback.run())?;

        worker.running = Some(running);
        worker.handle = Some(handle);
        info!(events = len, "playback started");
        Ok(true)
    }

    /// Requests the worker to stop. Returns whether playback was running.
    pub fn stop(&self) -> bool {
        let worker = self.lock_worker();
        let was_running = worker
            .running
            .as_ref()
            .is_some_and(|flag| flag.swap(false, Ordering::SeqCst));
        if was_running {
            info!("playback stopped");
        }
        was_running
    }

    /// Stops playback and blocks until the worker thread has exited.
    pub fn stop_and_wait(&self) {
        self.stop();
        let handle = self.lock_worker().handle.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("playback worker panicked");
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_running() {
            PlaybackState::Running
        } else {
            PlaybackState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().is_running()
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PlaybackLoop {
    sequence: SharedSequence,
    injector: Arc<dyn InputInjector>,
    pacer: Arc<dyn Pacer>,
    pass_pause: Duration,
    running: Arc<AtomicBool>,
}

impl PlaybackLoop {
    fn run(self) {
        let mut pass: u64 = 0;

        while self.is_running() {
            // copy under the lock; edits made during this pass show up on the next one
            let snapshot = lock_sequence(&self.sequence).clone();
            pass += 1;
            debug!(pass, events = snapshot.len(), "playback pass");

            for event in &snapshot {
                if !self.is_running() {
                    break;
                }
                self.dispatch(event);
                self.pacer.sleep(seconds(event.delay));
            }

            self.pacer.sleep(self.pass_pause);
        }

        debug!(passes = pass, "playback worker exited");
    }

    fn dispatch(&self, event: &Event) {
        let result = match event.mode {
            Mode::Press => self.injector.tap(event.kind, &event.value),
            Mode::Hold => self.injector.press(event.kind, &event.value).and_then(|()| {
                self.pacer.sleep(seconds(event.delay));
                self.injector.release(event.kind, &event.value)
            }),
        };

        if let Err(err) = result {
            warn!(kind = %event.kind, value = %event.value, error = %err, "dispatch failed");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn seconds(delay: f64) -> Duration {
    Duration::try_from_secs_f64(delay).unwrap_or_default()
}
